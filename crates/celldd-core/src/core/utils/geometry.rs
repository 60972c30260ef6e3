use nalgebra::{Point3, Vector3};

/// Folds one coordinate of `position` into `[0, box_length)` and records the number of
/// crossed periodic images in `image`.
///
/// Non-finite coordinates are left untouched.
pub fn fold_coordinate(
    position: &mut Point3<f64>,
    image: &mut [i32; 3],
    axis: usize,
    box_length: f64,
) {
    let x = position[axis];
    if !x.is_finite() || (0.0..box_length).contains(&x) {
        return;
    }
    let shift = (x / box_length).floor();
    let mut folded = x - shift * box_length;
    let mut crossings = shift as i32;
    if folded >= box_length {
        folded -= box_length;
        crossings += 1;
    } else if folded < 0.0 {
        folded += box_length;
        crossings -= 1;
    }
    position[axis] = folded;
    image[axis] += crossings;
}

/// Folds every periodic coordinate of `position` into the box.
pub fn fold_position(
    position: &mut Point3<f64>,
    image: &mut [i32; 3],
    box_lengths: &Vector3<f64>,
    periodic: [bool; 3],
) {
    for axis in (0..3).filter(|&axis| periodic[axis]) {
        fold_coordinate(position, image, axis, box_lengths[axis]);
    }
}

/// Displacement from `a` to `b` under the minimum-image convention on periodic axes.
pub fn minimum_image(
    a: &Point3<f64>,
    b: &Point3<f64>,
    box_lengths: &Vector3<f64>,
    periodic: [bool; 3],
) -> Vector3<f64> {
    let mut d = b - a;
    for axis in (0..3).filter(|&axis| periodic[axis]) {
        let length = box_lengths[axis];
        d[axis] -= (d[axis] / length).round() * length;
    }
    d
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_leaves_in_box_coordinates_alone() {
        let mut p = Point3::new(3.0, 0.0, 9.999);
        let mut image = [0; 3];
        fold_position(&mut p, &mut image, &Vector3::repeat(10.0), [true; 3]);
        assert_eq!(p, Point3::new(3.0, 0.0, 9.999));
        assert_eq!(image, [0; 3]);
    }

    #[test]
    fn fold_wraps_and_counts_images() {
        let mut p = Point3::new(-0.5, 10.0, 25.0);
        let mut image = [0; 3];
        fold_position(&mut p, &mut image, &Vector3::repeat(10.0), [true; 3]);
        assert!((p.x - 9.5).abs() < 1e-12);
        assert_eq!(p.y, 0.0);
        assert!((p.z - 5.0).abs() < 1e-12);
        assert_eq!(image, [-1, 1, 2]);
    }

    #[test]
    fn fold_skips_non_periodic_axes() {
        let mut p = Point3::new(-0.5, 0.0, 0.0);
        let mut image = [0; 3];
        fold_position(&mut p, &mut image, &Vector3::repeat(10.0), [false, true, true]);
        assert_eq!(p.x, -0.5);
        assert_eq!(image, [0; 3]);
    }

    #[test]
    fn tiny_negative_coordinate_never_folds_onto_box_length() {
        let mut p = Point3::new(-1e-17, 0.0, 0.0);
        let mut image = [0; 3];
        fold_coordinate(&mut p, &mut image, 0, 10.0);
        assert!(p.x >= 0.0 && p.x < 10.0);
    }

    #[test]
    fn minimum_image_picks_nearest_copy() {
        let d = minimum_image(
            &Point3::new(0.5, 0.0, 0.0),
            &Point3::new(9.5, 0.0, 0.0),
            &Vector3::repeat(10.0),
            [true; 3],
        );
        assert!((d.x + 1.0).abs() < 1e-12);
    }
}
