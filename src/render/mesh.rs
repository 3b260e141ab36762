// SPDX-License-Identifier: GPL-3.0-only

use super::Vertex;
use crate::errors::MeshError;

/// Indexed triangle mesh, validated on construction
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
}

impl Mesh {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Result<Self, MeshError> {
        if vertices.is_empty() {
            return Err(MeshError::Empty);
        }
        validate_indices(&indices, vertices.len())?;
        Ok(Self { vertices, indices })
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Position and value of the largest index, `None` without triangles
    pub fn highest_index(&self) -> Option<(usize, u32)> {
        self.indices
            .iter()
            .copied()
            .enumerate()
            .max_by_key(|(_, index)| *index)
    }
}

/// Check that `indices` describes whole triangles over `vertex_count` vertices
pub fn validate_indices(indices: &[u32], vertex_count: usize) -> Result<(), MeshError> {
    if indices.len() % 3 != 0 {
        return Err(MeshError::IndexCountNotTriangles {
            index_count: indices.len(),
        });
    }
    match indices
        .iter()
        .enumerate()
        .find(|(_, index)| **index as usize >= vertex_count)
    {
        Some((position, &index)) => Err(MeshError::IndexOutOfRange {
            position,
            index,
            vertex_count,
        }),
        None => Ok(()),
    }
}
