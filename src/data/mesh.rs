//! Per-tile cell storage.
//!
//! [`Mesh`] is a dense `width x height` array stored row-major
//! (`cells[x + y * width]`). [`TileBuffers`] pairs two meshes so a solver can
//! read the current state while writing the next one; `cycle` swaps them.

use crate::grid_error::GridError;
use std::fmt::Debug;
use std::ops::{Index, IndexMut};

/// Numeric cell types that can live in a mesh and cross the wire as raw bytes.
pub trait CellValue: bytemuck::Pod + num_traits::Zero + PartialEq + Debug + Send + 'static {}

impl<T> CellValue for T where T: bytemuck::Pod + num_traits::Zero + PartialEq + Debug + Send + 'static {}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "MeshParts<T>")]
pub struct Mesh<T> {
    width: usize,
    height: usize,
    cells: Vec<T>,
}

/// Unchecked serialized form; converted through the shape check.
#[derive(serde::Deserialize)]
struct MeshParts<T> {
    width: usize,
    height: usize,
    cells: Vec<T>,
}

impl<T> TryFrom<MeshParts<T>> for Mesh<T> {
    type Error = GridError;

    fn try_from(parts: MeshParts<T>) -> Result<Self, GridError> {
        if parts.width.checked_mul(parts.height) != Some(parts.cells.len()) {
            return Err(GridError::MeshShape {
                expected: (parts.width, parts.height),
                got: (parts.cells.len(), 1),
            });
        }
        Ok(Self {
            width: parts.width,
            height: parts.height,
            cells: parts.cells,
        })
    }
}

/// Empty 0x0 mesh.
impl<T> Default for Mesh<T> {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            cells: Vec::new(),
        }
    }
}

impl<T: CellValue> Mesh<T> {
    /// Zero-filled mesh.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![T::zero(); width * height],
        }
    }

    /// Wrap a row-major cell vector.
    pub fn from_vec(width: usize, height: usize, cells: Vec<T>) -> Result<Self, GridError> {
        if cells.len() != width * height {
            return Err(GridError::MeshShape {
                expected: (width, height),
                got: (cells.len(), 1),
            });
        }
        Ok(Self {
            width,
            height,
            cells,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Cell at `(x, y)`, or `None` outside the mesh.
    pub fn get(&self, x: usize, y: usize) -> Option<T> {
        (x < self.width && y < self.height).then(|| self.cells[x + y * self.width])
    }

    pub fn as_slice(&self) -> &[T] {
        &self.cells
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.cells
    }

    pub fn fill(&mut self, value: T) {
        self.cells.fill(value);
    }

    /// Overwrite every cell from `other`, which must have the same shape.
    pub fn copy_from(&mut self, other: &Mesh<T>) -> Result<(), GridError> {
        if other.shape() != self.shape() {
            return Err(GridError::MeshShape {
                expected: self.shape(),
                got: other.shape(),
            });
        }
        self.cells.copy_from_slice(&other.cells);
        Ok(())
    }
}

impl<T> Index<(usize, usize)> for Mesh<T> {
    type Output = T;

    fn index(&self, (x, y): (usize, usize)) -> &T {
        assert!(x < self.width && y < self.height, "cell ({x}, {y}) outside mesh");
        &self.cells[x + y * self.width]
    }
}

impl<T> IndexMut<(usize, usize)> for Mesh<T> {
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut T {
        assert!(x < self.width && y < self.height, "cell ({x}, {y}) outside mesh");
        &mut self.cells[x + y * self.width]
    }
}

/// Current/next pair of meshes for one tile.
///
/// Virtual tiles only ever use the current mesh; their next slot stays empty.
#[derive(Clone, Debug)]
pub struct TileBuffers<T> {
    meshes: [Mesh<T>; 2],
    current: usize,
}

impl<T: CellValue> TileBuffers<T> {
    pub fn double(width: usize, height: usize) -> Self {
        Self {
            meshes: [Mesh::new(width, height), Mesh::new(width, height)],
            current: 0,
        }
    }

    pub fn single(width: usize, height: usize) -> Self {
        Self {
            meshes: [Mesh::new(width, height), Mesh::default()],
            current: 0,
        }
    }

    pub fn current(&self) -> &Mesh<T> {
        &self.meshes[self.current]
    }

    pub fn current_mut(&mut self) -> &mut Mesh<T> {
        &mut self.meshes[self.current]
    }

    pub fn next_mut(&mut self) -> &mut Mesh<T> {
        &mut self.meshes[1 - self.current]
    }

    /// Move the next mesh out, leaving an empty placeholder.
    pub fn take_next(&mut self) -> Mesh<T> {
        std::mem::take(self.next_mut())
    }

    /// Put back a mesh previously obtained from [`take_next`](Self::take_next).
    pub fn restore_next(&mut self, mesh: Mesh<T>) {
        *self.next_mut() = mesh;
    }

    /// Make the next mesh a copy of the current one.
    pub fn sync_next(&mut self) {
        let current = self.current().clone();
        *self.next_mut() = current;
    }

    /// Swap current and next.
    pub fn cycle(&mut self) {
        self.current = 1 - self.current;
    }
}
