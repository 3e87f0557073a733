//! Inline picture markup

use super::package::EmbeddedImage;
use super::xml::{self, escape_xml, XmlElement};

/// EMUs per centimeter
pub const EMU_PER_CM: f64 = 360_000.0;

/// Width of the picture outline, in EMU (0.75 pt)
const BORDER_EMU: u64 = 9_525;

/// Requested size of a placed picture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PictureSize {
    pub width_cm: f64,
    /// Derived from the image's aspect ratio when absent
    pub height_cm: Option<f64>,
}

impl PictureSize {
    /// Resolve the extent in EMU for an embedded image
    pub fn extent_emu(&self, image: &EmbeddedImage) -> (u64, u64) {
        let width = (self.width_cm * EMU_PER_CM).round().max(1.0);
        let height = match (self.height_cm, image.pixel_size) {
            (Some(height_cm), _) => height_cm * EMU_PER_CM,
            (None, Some((px_w, px_h))) => width * px_h as f64 / px_w as f64,
            // Unknown dimensions: assume 4:3
            (None, None) => width * 3.0 / 4.0,
        };
        (width as u64, height.round().max(1.0) as u64)
    }
}

/// Build a run holding an inline picture with a thin black outline
///
/// `wp:effectExtent` reserves room for the outline on every side so Word does
/// not clip it at the edge of the picture frame.
pub fn picture_run(
    image: &EmbeddedImage,
    size: PictureSize,
    drawing_id: u32,
    description: &str,
) -> Result<XmlElement, roxmltree::Error> {
    let (cx, cy) = size.extent_emu(image);
    let name = format!("Picture {}", drawing_id);
    let markup = format!(
        r#"<w:r>
  <w:drawing>
    <wp:inline distT="0" distB="0" distL="0" distR="0" xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing">
      <wp:extent cx="{cx}" cy="{cy}"/>
      <wp:effectExtent l="{pad}" t="{pad}" r="{pad}" b="{pad}"/>
      <wp:docPr id="{id}" name="{name}" descr="{descr}"/>
      <wp:cNvGraphicFramePr>
        <a:graphicFrameLocks xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" noChangeAspect="1"/>
      </wp:cNvGraphicFramePr>
      <a:graphic xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">
        <a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">
          <pic:pic xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture">
            <pic:nvPicPr>
              <pic:cNvPr id="{id}" name="{name}"/>
              <pic:cNvPicPr/>
            </pic:nvPicPr>
            <pic:blipFill>
              <a:blip r:embed="{rel}" xmlns:r="{r_ns}"/>
              <a:stretch><a:fillRect/></a:stretch>
            </pic:blipFill>
            <pic:spPr>
              <a:xfrm>
                <a:off x="0" y="0"/>
                <a:ext cx="{cx}" cy="{cy}"/>
              </a:xfrm>
              <a:prstGeom prst="rect"><a:avLst/></a:prstGeom>
              <a:ln w="{pad}">
                <a:solidFill><a:srgbClr val="000000"/></a:solidFill>
              </a:ln>
            </pic:spPr>
          </pic:pic>
        </a:graphicData>
      </a:graphic>
    </wp:inline>
  </w:drawing>
</w:r>"#,
        cx = cx,
        cy = cy,
        pad = BORDER_EMU,
        id = drawing_id,
        name = name,
        descr = escape_xml(description),
        rel = image.rel_id,
        r_ns = xml::R_NS,
    );

    let mut elements = xml::parse_fragment(&markup)?;
    Ok(elements.remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(pixel_size: Option<(usize, usize)>) -> EmbeddedImage {
        EmbeddedImage {
            rel_id: "rId12".to_string(),
            pixel_size,
        }
    }

    #[test]
    fn test_extent_follows_aspect_ratio() {
        let size = PictureSize {
            width_cm: 10.0,
            height_cm: None,
        };
        assert_eq!(
            size.extent_emu(&image(Some((800, 600)))),
            (3_600_000, 2_700_000)
        );
        assert_eq!(size.extent_emu(&image(None)), (3_600_000, 2_700_000));

        let fixed = PictureSize {
            width_cm: 16.0,
            height_cm: Some(12.0),
        };
        assert_eq!(
            fixed.extent_emu(&image(Some((100, 100)))),
            (5_760_000, 4_320_000)
        );
    }

    #[test]
    fn test_picture_run_has_outline_and_padding() {
        let run = picture_run(
            &image(Some((4, 3))),
            PictureSize {
                width_cm: 15.0,
                height_cm: None,
            },
            5001,
            "Cover <1>",
        )
        .unwrap();
        let inline = run
            .child("w:drawing")
            .and_then(|d| d.child("wp:inline"))
            .unwrap();

        let padding = inline.child("wp:effectExtent").unwrap();
        for side in ["l", "t", "r", "b"] {
            assert_eq!(padding.attr(side), Some("9525"));
        }
        assert_eq!(inline.child("wp:docPr").unwrap().attr("descr"), Some("Cover <1>"));

        let markup = run.to_xml();
        assert!(markup.contains(r#"<a:ln w="9525">"#));
        assert!(markup.contains(r#"r:embed="rId12""#));
        assert!(markup.contains(r#"cx="5400000" cy="4050000""#));
    }
}
