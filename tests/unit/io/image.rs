//! Tests for grayscale image loading, masks and export

#[cfg(test)]
mod tests {
    use image::{GrayImage, Luma, Rgba, RgbaImage};
    use lbpfill::CompletionError;
    use lbpfill::io::image::{
        array_to_gray, export_grayscale, gray_to_array, load_grayscale, load_mask,
    };
    use ndarray::{Array2, array};
    use tempfile::TempDir;

    // Tests arrays are indexed [row, col] against image (x, y)
    // Verified by swapping width and height
    #[test]
    fn test_array_layout() {
        let intensities = array![[1u8, 2, 3], [4, 5, 6]];
        let gray = array_to_gray(&intensities);

        assert_eq!(gray.dimensions(), (3, 2));
        assert_eq!(gray.get_pixel(2, 0).0, [3]);
        assert_eq!(gray.get_pixel(0, 1).0, [4]);
        assert_eq!(gray_to_array(&gray), intensities);
    }

    // Tests export then load returns the same intensities
    // Verified by saving with a colour conversion
    #[test]
    fn test_export_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("out.png");
        let intensities = Array2::from_shape_fn((4, 5), |(r, c)| (r * 40 + c * 7) as u8);

        export_grayscale(&intensities, &path).unwrap();
        assert_eq!(load_grayscale(&path).unwrap(), intensities);
    }

    // Tests colour inputs are reduced to luminance
    // Verified by reading the red channel only
    #[test]
    fn test_colour_to_luminance() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("colour.png");
        let img = RgbaImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });
        img.save(&path).unwrap();

        let loaded = load_grayscale(&path).unwrap();
        assert_eq!(loaded.get([0, 0]).copied(), Some(255));
        let blue = loaded.get([0, 1]).copied().unwrap();
        assert!(blue > 0 && blue < 64);
    }

    // Tests missing files report the path
    // Verified by converting the error without a path
    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.png");

        match load_grayscale(&path) {
            Err(CompletionError::ImageLoad { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected ImageLoad, got {other:?}"),
        }
    }

    // Tests black mask pixels are observed and anything else is hidden
    // Verified by inverting the mask convention
    #[test]
    fn test_load_mask() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("photo_mask.png");
        let mask_img = GrayImage::from_fn(3, 2, |x, y| {
            if (x, y) == (1, 0) {
                Luma([255])
            } else if (x, y) == (2, 1) {
                Luma([1])
            } else {
                Luma([0])
            }
        });
        mask_img.save(&path).unwrap();

        let mask = load_mask(&path, 2, 3).unwrap();
        assert!(mask.is_observed(0, 0));
        assert!(!mask.is_observed(0, 1));
        assert!(!mask.is_observed(1, 2));
        assert_eq!(mask.unobserved_count(), 2);

        assert!(matches!(
            load_mask(&path, 3, 3),
            Err(CompletionError::InvalidDimensions { .. })
        ));
    }

    // Tests empty arrays are refused before touching the disk
    // Verified by letting the encoder reject the image
    #[test]
    fn test_export_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.png");

        assert!(matches!(
            export_grayscale(&Array2::zeros((0, 3)), &path),
            Err(CompletionError::InvalidSourceData { .. })
        ));
        assert!(!path.exists());
    }
}
