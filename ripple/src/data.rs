// Common geometries

#[rustfmt::skip]
pub static QUAD_VERTICES: [f32; 12] = [
     1.0, -1.0,
     1.0,  1.0,
    -1.0,  1.0,
    -1.0,  1.0,
    -1.0, -1.0,
     1.0, -1.0,
];

// The pool interior: a unit box around the origin. The vertex shader
// squashes it so the rim sits just above the water plane.
#[rustfmt::skip]
pub static POOL_VERTICES: [f32; 24] = [
    -1.0, -1.0, -1.0,
    -1.0, -1.0,  1.0,
    -1.0,  1.0, -1.0,
    -1.0,  1.0,  1.0,
     1.0, -1.0, -1.0,
     1.0,  1.0, -1.0,
     1.0, -1.0,  1.0,
     1.0,  1.0,  1.0,
];

#[rustfmt::skip]
pub static POOL_INDICES: [u16; 36] = [
    0, 1, 2, 2, 1, 3, // left
    4, 5, 6, 6, 5, 7, // right
    0, 2, 4, 4, 2, 5, // front
    1, 3, 6, 6, 3, 7, // back
    2, 3, 5, 5, 3, 7, // top
    0, 1, 4, 4, 1, 6, // bottom
];

/// Side length of the largest grid addressable with 16-bit indices.
pub const MAX_GRID_RESOLUTION: u32 = 256;

/// A regular grid of `resolution`² vertices spanning [-1, 1]², triangulated
/// with `u16` indices. The caustics pass displaces this mesh through the
/// height field, so its density should match the water resolution.
///
/// Resolutions outside `2..=MAX_GRID_RESOLUTION` are clamped; anything
/// larger would wrap the 16-bit indices.
pub fn grid_mesh(resolution: u32) -> (Vec<f32>, Vec<u16>) {
    let resolution = resolution.clamp(2, MAX_GRID_RESOLUTION);

    let step = 2.0 / (resolution - 1) as f32;

    let mut vertices = Vec::with_capacity((2 * resolution * resolution) as usize);
    for v in 0..resolution {
        for u in 0..resolution {
            vertices.push(-1.0 + u as f32 * step);
            vertices.push(-1.0 + v as f32 * step);
        }
    }

    let quads = resolution - 1;
    let mut indices = Vec::with_capacity((6 * quads * quads) as usize);
    for v in 0..quads {
        for u in 0..quads {
            let i = (v * resolution + u) as u16;
            let right = i + 1;
            let below = i + resolution as u16;
            indices.extend_from_slice(&[i, below, right, right, below, below + 1]);
        }
    }

    (vertices, indices)
}

/// An RGBA8 checkerboard used as the pool wall texture when no image has
/// been supplied.
pub fn checkerboard_tiles(size: u32, tiles_per_side: u32) -> Vec<u8> {
    let tile = (size / tiles_per_side).max(1);
    let light = [0x96, 0xb4, 0xc8, 0xff];
    let dark = [0x5a, 0x78, 0x96, 0xff];

    let mut data = Vec::with_capacity((4 * size * size) as usize);
    for y in 0..size {
        for x in 0..size {
            let parity = ((x / tile) + (y / tile)) % 2;
            data.extend_from_slice(if parity == 0 { &light } else { &dark });
        }
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_covers_clip_space() {
        assert_eq!(QUAD_VERTICES.len(), 12);
        assert!(QUAD_VERTICES.iter().all(|c| c.abs() == 1.0));
    }

    #[test]
    fn pool_box_is_eight_vertices_twelve_triangles() {
        assert_eq!(POOL_VERTICES.len(), 3 * 8);
        assert_eq!(POOL_INDICES.len(), 3 * 12);
        assert!(POOL_INDICES.iter().all(|&i| i < 8));

        // Every vertex is referenced by at least one triangle.
        for vertex in 0..8u16 {
            assert!(POOL_INDICES.contains(&vertex));
        }
    }

    #[test]
    fn grid_mesh_has_expected_counts() {
        let (vertices, indices) = grid_mesh(16);
        assert_eq!(vertices.len(), 2 * 16 * 16);
        assert_eq!(indices.len(), 6 * 15 * 15);
    }

    #[test]
    fn grid_mesh_indices_are_in_range() {
        let (vertices, indices) = grid_mesh(32);
        let vertex_count = (vertices.len() / 2) as u16;
        assert!(indices.iter().all(|&i| i < vertex_count));
    }

    #[test]
    fn grid_mesh_spans_the_unit_square() {
        let (vertices, _) = grid_mesh(64);
        let min = vertices.iter().cloned().fold(f32::INFINITY, f32::min);
        let max = vertices.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        assert_eq!(min, -1.0);
        assert_eq!(max, 1.0);
    }

    #[test]
    fn grid_mesh_supports_the_largest_u16_grid() {
        let (vertices, indices) = grid_mesh(256);
        assert_eq!(vertices.len() / 2, 65536);
        assert_eq!(*indices.iter().max().unwrap(), u16::MAX);
    }

    #[test]
    fn grid_mesh_clamps_oversized_resolutions() {
        // Unvalidated configuration must not wrap the 16-bit indices.
        let (vertices, indices) = grid_mesh(300);
        let (max_vertices, max_indices) = grid_mesh(MAX_GRID_RESOLUTION);
        assert_eq!(vertices.len(), max_vertices.len());
        assert_eq!(indices.len(), max_indices.len());

        let vertex_count = vertices.len() / 2;
        assert!(indices.iter().all(|&i| (i as usize) < vertex_count));
    }

    #[test]
    fn grid_mesh_clamps_degenerate_resolutions() {
        for resolution in [0, 1] {
            let (vertices, indices) = grid_mesh(resolution);
            assert_eq!(vertices.len(), 2 * 2 * 2);
            assert_eq!(indices.len(), 6);
            assert!(vertices.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn checkerboard_is_rgba_and_alternates() {
        let size = 64;
        let tiles = checkerboard_tiles(size, 8);
        assert_eq!(tiles.len(), (4 * size * size) as usize);

        // Opaque everywhere.
        assert!(tiles.chunks_exact(4).all(|texel| texel[3] == 0xff));

        // Two neighbouring tiles differ.
        let texel_at = |x: u32, y: u32| {
            let offset = (4 * (y * size + x)) as usize;
            &tiles[offset..offset + 4]
        };
        assert_ne!(texel_at(0, 0), texel_at(8, 0));
        assert_eq!(texel_at(0, 0), texel_at(16, 0));
    }
}
