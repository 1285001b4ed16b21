//! Slicer options and their defaults

use crate::drawing::{scaled_px, MAX_SHEET_HEIGHT_PX, MAX_SHEET_WIDTH_PX};
use crate::error::{SlicerError, SlicerResult};

/// Width used when none is given, in pixels
pub const DEFAULT_SLICER_WIDTH: u32 = 200;
/// Height used when none is given, in pixels
pub const DEFAULT_SLICER_HEIGHT: u32 = 200;
/// Scale used when none is given
pub const DEFAULT_DRAWING_SCALE: f64 = 1.0;

/// How the drawing anchor follows cell moves and resizes (`xdr:twoCellAnchor/@editAs`)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Positioning {
    /// Move with cells but keep size
    #[default]
    OneCell,
    /// Move and size with cells
    TwoCell,
    /// Neither move nor size with cells
    Absolute,
}

impl Positioning {
    /// Attribute value
    pub fn as_str(&self) -> &'static str {
        match self {
            Positioning::OneCell => "oneCell",
            Positioning::TwoCell => "twoCell",
            Positioning::Absolute => "absolute",
        }
    }
}

/// Placement and protection of the slicer shape
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphicOptions {
    /// Print the slicer with the sheet (default `true`)
    pub print_object: Option<bool>,
    /// Lock the slicer with the sheet (default `false`)
    pub locked: Option<bool>,
    /// Horizontal scale (0 means default)
    pub scale_x: f64,
    /// Vertical scale (0 means default)
    pub scale_y: f64,
    /// Horizontal offset from the anchor cell, in pixels
    pub offset_x: i32,
    /// Vertical offset from the anchor cell, in pixels
    pub offset_y: i32,
    pub positioning: Option<Positioning>,
    /// Description written to the legacy shape (`cNvPr/@descr`)
    pub alt_text: Option<String>,
}

/// Settings for one table slicer.
///
/// `name`, `table` and `cell` are required. Everything else has a default
/// that [`SlicerOptions::validate`] fills in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlicerOptions {
    /// Table column the slicer filters on
    pub name: String,
    /// Table name (or display name)
    pub table: String,
    /// Top-left anchor cell, A1 style
    pub cell: String,
    pub caption: String,
    /// Macro assigned to the legacy shape
    pub macro_name: Option<String>,
    /// Width in pixels (0 means default)
    pub width: u32,
    /// Height in pixels (0 means default)
    pub height: u32,
    /// Show the slicer header (default `true`)
    pub display_header: Option<bool>,
    /// Sort items descending
    pub item_desc: bool,
    pub format: GraphicOptions,
}

impl SlicerOptions {
    /// Options with the three required fields set
    pub fn new(name: impl Into<String>, table: impl Into<String>, cell: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            cell: cell.into(),
            ..Default::default()
        }
    }

    /// Set the caption
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = caption.into();
        self
    }

    /// Check required fields and fill in defaults.
    pub fn validate(opts: Option<SlicerOptions>) -> SlicerResult<SlicerOptions> {
        let mut opts = opts.ok_or(SlicerError::MissingOptions)?;

        for (field, value) in [("name", &opts.name), ("table", &opts.table), ("cell", &opts.cell)] {
            if value.is_empty() {
                return Err(SlicerError::InvalidOptions(format!("{field} is required")));
            }
        }

        if opts.width == 0 {
            opts.width = DEFAULT_SLICER_WIDTH;
        }
        if opts.height == 0 {
            opts.height = DEFAULT_SLICER_HEIGHT;
        }

        let format = &mut opts.format;
        format.print_object.get_or_insert(true);
        format.locked.get_or_insert(false);
        format.scale_x = normalize_scale("scale_x", format.scale_x)?;
        format.scale_y = normalize_scale("scale_y", format.scale_y)?;

        if scaled_px(opts.width, format.scale_x, MAX_SHEET_WIDTH_PX).is_none() {
            return Err(SlicerError::InvalidOptions(format!(
                "scaled width {} x {} is wider than a sheet",
                opts.width, format.scale_x
            )));
        }
        if scaled_px(opts.height, format.scale_y, MAX_SHEET_HEIGHT_PX).is_none() {
            return Err(SlicerError::InvalidOptions(format!(
                "scaled height {} x {} is taller than a sheet",
                opts.height, format.scale_y
            )));
        }

        Ok(opts)
    }

    /// Whether the shape prints with the sheet
    pub fn prints_with_sheet(&self) -> bool {
        self.format.print_object.unwrap_or(true)
    }

    /// Whether the shape locks with the sheet
    pub fn locks_with_sheet(&self) -> bool {
        self.format.locked.unwrap_or(false)
    }
}

fn normalize_scale(field: &str, scale: f64) -> SlicerResult<f64> {
    if scale == 0.0 {
        return Ok(DEFAULT_DRAWING_SCALE);
    }
    if !scale.is_finite() || scale < 0.0 {
        return Err(SlicerError::InvalidOptions(format!(
            "{field} must be a positive number, got {scale}"
        )));
    }
    Ok(scale)
}
