//! Cover photo and photo gallery placement

use std::path::Path;

use super::substitute;
use super::ExportError;
use crate::config::PhotoConfig;
use crate::docx::paragraph::{self, RunFormat};
use crate::docx::{drawing, Body, DocxPackage, PackageError, PictureSize, XmlElement};
use crate::project::PhotoBlock;

/// Embed an image and build its picture run, or `None` if the file is missing
fn picture(
    package: &mut DocxPackage,
    path: Option<&Path>,
    size: PictureSize,
    description: &str,
) -> Result<Option<XmlElement>, ExportError> {
    let Some(path) = path else {
        return Ok(None);
    };
    if !path.is_file() {
        log::warn!("Photo not found: {}", path.display());
        return Ok(None);
    }
    let Some(image) = package.embed_image(path)? else {
        return Ok(None);
    };
    let id = package.next_drawing_id();
    let run = drawing::picture_run(&image, size, id, description).map_err(|source| PackageError::Xml {
        part: "drawing".to_string(),
        source,
    })?;
    Ok(Some(run))
}

/// Put the cover photo into the paragraph holding `marker`
///
/// The marker text is always removed. A missing file leaves the paragraph
/// empty. Returns whether a picture was placed.
pub fn insert_cover_photo(
    package: &mut DocxPackage,
    marker: &str,
    path: Option<&Path>,
    size: PictureSize,
) -> Result<bool, ExportError> {
    let index = Body::new(package.body_mut()?).find_marker(marker);
    let Some(index) = index else {
        if path.is_none() {
            log::debug!("No {} marker and no cover photo", marker);
            return Ok(false);
        }
        return Err(ExportError::MarkerNotFound {
            marker: marker.to_string(),
        });
    };

    let run = picture(package, path, size, "Cover photo")?;

    let mut body = Body::new(package.body_mut()?);
    let Some(target) = body.get_mut(index) else {
        return Err(ExportError::MarkerNotFound {
            marker: marker.to_string(),
        });
    };
    substitute::remove_marker(target, marker);
    let placed = run.is_some();
    if let Some(run) = run {
        target.push(run);
    }
    log::info!("Cover photo {}", if placed { "placed" } else { "slot left empty" });
    Ok(placed)
}

/// Insert image and caption paragraphs after the paragraph holding `marker`
///
/// Captions read `<label> <n>. <caption>`, numbered from 1. With an empty
/// gallery only the marker is removed. Returns the number of entries.
pub fn insert_photo_gallery(
    package: &mut DocxPackage,
    marker: &str,
    photos: &PhotoBlock,
    config: &PhotoConfig,
) -> Result<usize, ExportError> {
    if photos.gallery.is_empty() {
        substitute::remove_marker_everywhere(package, marker)?;
        return Ok(0);
    }

    let index = Body::new(package.body_mut()?)
        .find_marker(marker)
        .ok_or_else(|| ExportError::MarkerNotFound {
            marker: marker.to_string(),
        })?;

    let size = config.gallery_size();
    let space_after = config.space_after_pt.saturating_mul(20);
    let mut paragraphs = Vec::with_capacity(photos.gallery.len() * 2);
    for (n, record) in photos.gallery.iter().enumerate() {
        let number = n + 1;
        let caption = format!("{} {}. {}", config.caption_label, number, record.caption.trim());
        let caption = caption.trim_end();

        let mut image_paragraph = XmlElement::new("w:p");
        paragraph::set_alignment(&mut image_paragraph, "center");
        paragraph::set_space_after(&mut image_paragraph, space_after);
        let path = photos.resolve(record);
        if let Some(run) = picture(package, path.as_deref(), size, caption)? {
            image_paragraph.push(run);
        }

        let mut caption_paragraph = paragraph::new_paragraph(caption, &RunFormat::default());
        paragraph::set_alignment(&mut caption_paragraph, "center");
        paragraph::set_space_after(&mut caption_paragraph, space_after);

        paragraphs.push(image_paragraph);
        paragraphs.push(caption_paragraph);
    }

    let mut body = Body::new(package.body_mut()?);
    if let Some(target) = body.get_mut(index) {
        substitute::remove_marker(target, marker);
    }
    for (offset, p) in paragraphs.into_iter().enumerate() {
        body.insert(index + 1 + offset, p);
    }

    log::info!("Inserted {} gallery photos", photos.gallery.len());
    Ok(photos.gallery.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::PhotoRecord;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    const PNG: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x03, 0x08, 0x02, 0x00, 0x00, 0x00,
    ];

    fn package(body: &str) -> DocxPackage {
        let document = format!(
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}<w:sectPr/></w:body></w:document>"#,
            body
        );
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut zip = ZipWriter::new(&mut buffer);
            let options = SimpleFileOptions::default();
            zip.start_file("[Content_Types].xml", options).unwrap();
            zip.write_all(br#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/></Types>"#)
                .unwrap();
            zip.start_file("word/document.xml", options).unwrap();
            zip.write_all(document.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        DocxPackage::from_reader(Cursor::new(buffer.into_inner())).unwrap()
    }

    fn texts(package: &mut DocxPackage) -> Vec<String> {
        package
            .body_mut()
            .unwrap()
            .elements()
            .map(|e| e.text())
            .collect()
    }

    #[test]
    fn test_cover_photo_with_missing_file_leaves_empty_slot() {
        let mut package = package(r#"<w:p><w:r><w:t>{{PHOTO_COVER}}</w:t></w:r></w:p>"#);
        let placed = insert_cover_photo(
            &mut package,
            "{{PHOTO_COVER}}",
            Some(Path::new("/no/such/cover.jpg")),
            PhotoConfig::default().cover_size(),
        )
        .unwrap();
        assert!(!placed);
        assert_eq!(texts(&mut package)[0], "");
        assert!(!package.part_names().any(|n| n.starts_with("word/media/")));
    }

    #[test]
    fn test_cover_photo_is_embedded() {
        let dir = tempfile::tempdir().unwrap();
        let cover = dir.path().join("cover.png");
        std::fs::write(&cover, PNG).unwrap();

        let mut package = package(r#"<w:p><w:r><w:t>{{PHOTO_COVER}}</w:t></w:r></w:p>"#);
        let placed = insert_cover_photo(
            &mut package,
            "{{PHOTO_COVER}}",
            Some(&cover),
            PhotoConfig::default().cover_size(),
        )
        .unwrap();
        assert!(placed);

        let body = package.body_mut().unwrap();
        let p = body.child("w:p").unwrap();
        assert!(p.to_xml().contains("<a:ln w=\"9525\">"));
        assert!(package.has_part("word/media/bridgedoc_image1.png"));
    }

    #[test]
    fn test_gallery_inserts_image_and_caption_pairs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1.png"), PNG).unwrap();

        let photos = PhotoBlock {
            folder: dir.path().to_path_buf(),
            cover: PhotoRecord::default(),
            gallery: vec![
                PhotoRecord::new("1.png", "Общий вид"),
                PhotoRecord::new("missing.png", "Опора 2"),
            ],
        };
        let mut package = package(
            r#"<w:p><w:r><w:t>{{PHOTOS_SECTION}}</w:t></w:r></w:p><w:p><w:r><w:t>After</w:t></w:r></w:p>"#,
        );
        let config = PhotoConfig::default();
        let count = insert_photo_gallery(&mut package, "{{PHOTOS_SECTION}}", &photos, &config).unwrap();
        assert_eq!(count, 2);

        let texts = texts(&mut package);
        assert_eq!(
            texts,
            vec!["", "", "Photo 1. Общий вид", "", "Photo 2. Опора 2", "After", ""]
        );

        let body = package.body_mut().unwrap();
        let paragraphs: Vec<_> = body.children_named("w:p").collect();
        assert!(paragraphs[1].to_xml().contains("<w:drawing>"));
        assert!(!paragraphs[3].to_xml().contains("<w:drawing>"));
        let jc = paragraphs[2]
            .child("w:pPr")
            .and_then(|ppr| ppr.child("w:jc"))
            .and_then(|jc| jc.attr("w:val"));
        assert_eq!(jc, Some("center"));
    }

    #[test]
    fn test_gallery_spacing_saturates() {
        let photos = PhotoBlock {
            gallery: vec![PhotoRecord::new("missing.png", "")],
            ..PhotoBlock::default()
        };
        let config = PhotoConfig {
            space_after_pt: u32::MAX,
            ..PhotoConfig::default()
        };
        let mut package = package(r#"<w:p><w:r><w:t>{{PHOTOS_SECTION}}</w:t></w:r></w:p>"#);
        insert_photo_gallery(&mut package, "{{PHOTOS_SECTION}}", &photos, &config).unwrap();

        let body = package.body_mut().unwrap();
        let after = body
            .children_named("w:p")
            .nth(1)
            .and_then(|p| p.child("w:pPr"))
            .and_then(|ppr| ppr.child("w:spacing"))
            .and_then(|spacing| spacing.attr("w:after"));
        assert_eq!(after, Some(u32::MAX.to_string().as_str()));
    }

    #[test]
    fn test_empty_gallery_only_strips_marker() {
        let mut package = package(r#"<w:p><w:r><w:t>Photos {{PHOTOS_SECTION}}</w:t></w:r></w:p>"#);
        let count = insert_photo_gallery(
            &mut package,
            "{{PHOTOS_SECTION}}",
            &PhotoBlock::default(),
            &PhotoConfig::default(),
        )
        .unwrap();
        assert_eq!(count, 0);
        assert_eq!(texts(&mut package), vec!["Photos ", ""]);
    }

    #[test]
    fn test_gallery_without_marker_is_an_error() {
        let mut package = package(r#"<w:p/>"#);
        let photos = PhotoBlock {
            gallery: vec![PhotoRecord::new("a.jpg", "")],
            ..PhotoBlock::default()
        };
        let err = insert_photo_gallery(&mut package, "{{PHOTOS_SECTION}}", &photos, &PhotoConfig::default())
            .unwrap_err();
        assert!(matches!(err, ExportError::MarkerNotFound { .. }));
    }
}
