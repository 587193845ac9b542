//! Loading `.npy` images and scaling them to the unit interval.

use crate::error::{LabelError, Result};
use ndarray::{Array2, ArrayD, Axis, Ix2};
use ndarray_npy::{ReadNpyError, ReadNpyExt, ReadableElement};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Read a 2-D numeric array from an `.npy` file.
///
/// Any integer or float dtype is accepted and widened to `f64`. Singleton axes
/// are squeezed, so `(1, H, W)` and `(H, W, 1)` load as `(H, W)`.
pub fn load_array(path: impl AsRef<Path>) -> Result<Array2<f64>> {
    let path = path.as_ref();
    let load_err = |reason: String| LabelError::ArrayLoadError {
        path: path.to_path_buf(),
        reason,
    };
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => load_err("file not found".to_string()),
        _ => load_err(e.to_string()),
    })?;

    let array = decode_any(&bytes).map_err(|e| load_err(e.to_string()))?;
    let array = squeeze(array);
    if array.ndim() != 2 {
        return Err(load_err(format!(
            "expected a 2-D array, found shape {:?}",
            array.shape()
        )));
    }
    if array.is_empty() {
        return Err(load_err("array is empty".to_string()));
    }
    array
        .into_dimensionality::<Ix2>()
        .map_err(|e| load_err(e.to_string()))
}

fn decode_any(bytes: &[u8]) -> std::result::Result<ArrayD<f64>, ReadNpyError> {
    let first = match decode_as::<f64>(bytes, |v| v) {
        Ok(a) => return Ok(a),
        Err(e) => e,
    };
    decode_as::<f32>(bytes, f64::from)
        .or_else(|_| decode_as::<u8>(bytes, f64::from))
        .or_else(|_| decode_as::<u16>(bytes, f64::from))
        .or_else(|_| decode_as::<u32>(bytes, f64::from))
        .or_else(|_| decode_as::<i8>(bytes, f64::from))
        .or_else(|_| decode_as::<i16>(bytes, f64::from))
        .or_else(|_| decode_as::<i32>(bytes, f64::from))
        .or_else(|_| decode_as::<i64>(bytes, |v| v as f64))
        .or_else(|_| decode_as::<u64>(bytes, |v| v as f64))
        .map_err(|_| first)
}

fn decode_as<T>(bytes: &[u8], widen: fn(T) -> f64) -> std::result::Result<ArrayD<f64>, ReadNpyError>
where
    T: ReadableElement + Copy,
{
    let raw = ArrayD::<T>::read_npy(bytes)?;
    Ok(raw.mapv(widen))
}

fn squeeze(mut array: ArrayD<f64>) -> ArrayD<f64> {
    while array.ndim() > 2 {
        match array.shape().iter().position(|&len| len == 1) {
            Some(axis) => array = array.index_axis_move(Axis(axis), 0),
            None => break,
        }
    }
    array
}

/// Min-max scale `array` to `[0, 1]` over its own values.
///
/// `name` only labels the error when the range is zero or any value is not
/// finite.
pub fn normalize(array: &Array2<f64>, name: &str) -> Result<Array2<f64>> {
    if array.iter().any(|v| !v.is_finite()) {
        return Err(LabelError::DegenerateRange {
            name: name.to_string(),
        });
    }
    let (min, max) = array
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min;
    if !range.is_finite() || range <= 0.0 {
        return Err(LabelError::DegenerateRange {
            name: name.to_string(),
        });
    }
    Ok(array.mapv(|v| (v - min) / range))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use approx::assert_relative_eq;
    use ndarray::{Array3, array};
    use ndarray_npy::write_npy;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn loads_f32_and_widens() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("a_gt.npy");
        write_npy(&path, &array![[0.5f32, 1.0], [2.0, 4.0]])?;
        let loaded = load_array(&path)?;
        assert_eq!(loaded, array![[0.5, 1.0], [2.0, 4.0]]);
        Ok(())
    }

    #[test]
    fn loads_integer_arrays() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("a_gt.npy");
        write_npy(&path, &array![[0u16, 300], [65535, 7]])?;
        let loaded = load_array(&path)?;
        assert_eq!(loaded[[1, 0]], 65535.0);
        Ok(())
    }

    #[test]
    fn squeezes_channel_axis() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("a_gt.npy");
        write_npy(&path, &Array3::<f64>::from_elem((4, 3, 1), 2.0))?;
        let loaded = load_array(&path)?;
        assert_eq!(loaded.dim(), (4, 3));
        Ok(())
    }

    #[test]
    fn rejects_three_channel_volume() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("a_gt.npy");
        write_npy(&path, &Array3::<f64>::zeros((4, 3, 3)))?;
        let err = load_array(&path).unwrap_err();
        assert!(matches!(err, LabelError::ArrayLoadError { .. }));
        Ok(())
    }

    #[test]
    fn rejects_garbage_and_missing_files() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("junk_gt.npy");
        File::create(&path)?.write_all(b"definitely not numpy")?;
        assert!(matches!(
            load_array(&path).unwrap_err(),
            LabelError::ArrayLoadError { .. }
        ));
        assert!(matches!(
            load_array(dir.path().join("absent.npy")).unwrap_err(),
            LabelError::ArrayLoadError { .. }
        ));
        Ok(())
    }

    #[test]
    fn normalize_spans_unit_interval() -> Result<()> {
        let a = array![[-3.0, 1.0], [5.0, 0.0]];
        let n = normalize(&a, "a")?;
        let min = n.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = n.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(min, 0.0);
        assert_eq!(max, 1.0);
        assert_relative_eq!(n[[0, 1]], 0.5);
        Ok(())
    }

    #[test]
    fn normalize_flat_array_is_degenerate() {
        let err = normalize(&Array2::from_elem((3, 3), 7.0), "flat_gt.npy").unwrap_err();
        match err {
            LabelError::DegenerateRange { name } => assert_eq!(name, "flat_gt.npy"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn normalize_rejects_non_finite_values() {
        let a = array![[0.0, f64::INFINITY]];
        assert!(matches!(
            normalize(&a, "inf").unwrap_err(),
            LabelError::DegenerateRange { .. }
        ));
    }

    #[test]
    fn normalize_rejects_nan_next_to_valid_range() {
        let a = array![[0.0, 1.0], [f64::NAN, 0.5]];
        assert!(matches!(
            normalize(&a, "nan_gt.npy").unwrap_err(),
            LabelError::DegenerateRange { .. }
        ));
    }
}
