//! Bounding-polygon → axis-aligned box.

use crate::model::{BoundingBox, BoundingPoly};

/// Reduce a polygon to `[minX, minY, maxX, maxY]`.
///
/// Returns `None` when there is no polygon or it has no vertices. Min and
/// max are taken per axis, so vertex order does not matter.
pub fn normalize(poly: Option<&BoundingPoly>) -> Option<BoundingBox> {
    let vertices = &poly?.normalized_vertices;
    let first = vertices.first()?;
    let seed = BoundingBox {
        min_x: first.x(),
        min_y: first.y(),
        max_x: first.x(),
        max_y: first.y(),
    };
    Some(vertices.iter().skip(1).fold(seed, |b, v| BoundingBox {
        min_x: b.min_x.min(v.x()),
        min_y: b.min_y.min(v.y()),
        max_x: b.max_x.max(v.x()),
        max_y: b.max_y.max(v.y()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Vertex;

    fn poly(points: &[(f64, f64)]) -> BoundingPoly {
        BoundingPoly {
            normalized_vertices: points.iter().map(|&(x, y)| Vertex::new(x, y)).collect(),
        }
    }

    #[test]
    fn no_geometry_is_none() {
        assert_eq!(normalize(None), None);
        assert_eq!(normalize(Some(&poly(&[]))), None);
    }

    #[test]
    fn min_max_per_axis() {
        let b = normalize(Some(&poly(&[(0.1, 0.1), (0.5, 0.1), (0.5, 0.4), (0.1, 0.4)]))).unwrap();
        assert_eq!(<[f64; 4]>::from(b), [0.1, 0.1, 0.5, 0.4]);
    }

    #[test]
    fn every_rotation_and_reversal_gives_the_same_box() {
        let points = [(0.3, 0.9), (0.1, 0.2), (0.7, 0.4), (0.2, 0.05)];
        let expected = normalize(Some(&poly(&points))).unwrap();
        for shift in 0..points.len() {
            let mut rotated = points.to_vec();
            rotated.rotate_left(shift);
            assert_eq!(normalize(Some(&poly(&rotated))), Some(expected));
            rotated.reverse();
            assert_eq!(normalize(Some(&poly(&rotated))), Some(expected));
        }
    }

    #[test]
    fn missing_coordinates_count_as_zero() {
        let p = BoundingPoly {
            normalized_vertices: vec![
                Vertex { x: Some(0.6), y: None },
                Vertex { x: None, y: Some(0.8) },
            ],
        };
        let b = normalize(Some(&p)).unwrap();
        assert_eq!(<[f64; 4]>::from(b), [0.0, 0.0, 0.6, 0.8]);
    }
}
