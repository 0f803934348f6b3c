//! Page geometry: page sizes and image placement on a page.
//!
//! All dimensions are PDF points (1/72 inch). Rectangles use the PDF origin
//! (bottom-left), but every placement here is symmetric so the same numbers
//! hold for a top-left origin.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Target page size for images placed into a PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSize {
    /// ISO A4, 595.28 × 841.89 pt. (default)
    #[default]
    A4,
    /// US Letter, 612 × 792 pt.
    Letter,
    /// The page takes the size of the image it holds.
    Fit,
}

impl PageSize {
    /// Page dimensions for an image of `image` size.
    pub fn dimensions(self, image: (f32, f32)) -> (f32, f32) {
        match self {
            PageSize::A4 => (595.28, 841.89),
            PageSize::Letter => (612.0, 792.0),
            PageSize::Fit => image,
        }
    }
}

impl FromStr for PageSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "a4" => Ok(PageSize::A4),
            "letter" => Ok(PageSize::Letter),
            "fit" => Ok(PageSize::Fit),
            other => Err(format!("unknown page size '{other}'")),
        }
    }
}

/// How an image is positioned on its page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    /// Fill the page exactly; aspect ratio is ignored.
    Stretch,
    /// Scale uniformly until the constraining axis fills the page, centred on
    /// the other axis.
    Fit,
    /// Centre on the page, shrinking to fit if needed but never enlarging.
    /// (default)
    #[default]
    Center,
}

impl FromStr for Placement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stretch" => Ok(Placement::Stretch),
            "fit" => Ok(Placement::Fit),
            "center" | "centre" => Ok(Placement::Center),
            other => Err(format!("unknown placement '{other}'")),
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Placement::Stretch => "stretch",
            Placement::Fit => "fit",
            Placement::Center => "center",
        };
        f.write_str(s)
    }
}

/// Where an image is drawn on a page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Placement {
    /// Compute the drawing rectangle for an `image` (w, h) on a `page` (w, h).
    pub fn place(self, image: (f32, f32), page: (f32, f32)) -> Rect {
        let (img_w, img_h) = image;
        let (page_w, page_h) = page;

        let (width, height) = match self {
            Placement::Stretch => {
                return Rect {
                    x: 0.0,
                    y: 0.0,
                    width: page_w,
                    height: page_h,
                }
            }
            Placement::Fit => {
                let img_aspect = img_w / img_h;
                let page_aspect = page_w / page_h;
                if img_aspect > page_aspect {
                    (page_w, page_w / img_aspect)
                } else {
                    (page_h * img_aspect, page_h)
                }
            }
            Placement::Center => {
                let scale = (page_w / img_w).min(page_h / img_h).min(1.0);
                (img_w * scale, img_h * scale)
            }
        };

        Rect {
            x: (page_w - width) / 2.0,
            y: (page_h - height) / 2.0,
            width,
            height,
        }
    }
}
