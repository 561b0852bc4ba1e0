//! Container signature sniffing over a fixed leading byte window

use super::CameraFormat;

/// Number of leading bytes inspected for container signatures.
pub const SIGNATURE_WINDOW: usize = 12;

const HEIF_BRANDS: &[&[u8; 4]] = &[
    b"heic", b"heix", b"hevc", b"hevx", b"heim", b"heis", b"mif1", b"msf1",
];
const AVIF_BRANDS: &[&[u8; 4]] = &[b"avif", b"avis"];

/// Camera-native container signature in the first [`SIGNATURE_WINDOW`] bytes, if any.
pub fn sniff_camera_format(data: &[u8]) -> Option<CameraFormat> {
    let window = &data[..data.len().min(SIGNATURE_WINDOW)];
    if window.len() < SIGNATURE_WINDOW {
        return None;
    }

    // ISO-BMFF: [box size: 4][b"ftyp"][major brand: 4]
    if &window[4..8] == b"ftyp" {
        let brand = &window[8..12];
        if HEIF_BRANDS.iter().any(|b| &b[..] == brand) {
            return Some(if brand == b"heic" || brand == b"heix" {
                CameraFormat::Heic
            } else {
                CameraFormat::Heif
            });
        }
        if AVIF_BRANDS.iter().any(|b| &b[..] == brand) {
            return Some(CameraFormat::Avif);
        }
        return None;
    }

    // Canon CR2: little-endian TIFF header followed by "CR" at offset 8.
    if &window[0..4] == b"II*\0" && &window[8..10] == b"CR" {
        return Some(CameraFormat::CanonRaw);
    }

    None
}

/// MIME type of common web formats by magic number.
pub fn sniff_web_mime(data: &[u8]) -> Option<&'static str> {
    if data.len() >= 3 && data[..3] == [0xFF, 0xD8, 0xFF] {
        return Some("image/jpeg");
    }
    if data.len() >= 8 && data[..8] == [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A] {
        return Some("image/png");
    }
    if data.len() >= 6 && (&data[..6] == b"GIF87a" || &data[..6] == b"GIF89a") {
        return Some("image/gif");
    }
    if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ftyp(brand: &[u8; 4]) -> Vec<u8> {
        let mut data = vec![0x00, 0x00, 0x00, 0x18];
        data.extend_from_slice(b"ftyp");
        data.extend_from_slice(brand);
        data.extend_from_slice(&[0u8; 16]);
        data
    }

    #[test]
    fn detects_heif_family_brands() {
        assert_eq!(sniff_camera_format(&ftyp(b"heic")), Some(CameraFormat::Heic));
        assert_eq!(sniff_camera_format(&ftyp(b"heix")), Some(CameraFormat::Heic));
        assert_eq!(sniff_camera_format(&ftyp(b"mif1")), Some(CameraFormat::Heif));
        assert_eq!(sniff_camera_format(&ftyp(b"avif")), Some(CameraFormat::Avif));
    }

    #[test]
    fn ignores_other_iso_bmff_brands() {
        assert_eq!(sniff_camera_format(&ftyp(b"isom")), None);
        assert_eq!(sniff_camera_format(&ftyp(b"mp42")), None);
    }

    #[test]
    fn detects_canon_raw() {
        let mut data = b"II*\0\x10\0\0\0CR\x02\0".to_vec();
        data.extend_from_slice(&[0u8; 8]);
        assert_eq!(sniff_camera_format(&data), Some(CameraFormat::CanonRaw));
    }

    #[test]
    fn plain_tiff_is_not_raw() {
        let data = b"II*\0\x08\0\0\0\0\0\0\0".to_vec();
        assert_eq!(sniff_camera_format(&data), None);
    }

    #[test]
    fn short_input_is_never_detected() {
        assert_eq!(sniff_camera_format(b"\0\0\0\x18ftyp"), None);
        assert_eq!(sniff_camera_format(&[]), None);
    }

    #[test]
    fn web_mime_sniffing() {
        assert_eq!(sniff_web_mime(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(sniff_web_mime(b"GIF89a...."), Some("image/gif"));
        assert_eq!(sniff_web_mime(b"RIFF\0\0\0\0WEBPVP8 "), Some("image/webp"));
        assert_eq!(sniff_web_mime(b"hello"), None);
    }
}
