//! Column width arithmetic: even distribution, resize and presets.

use crate::error::{FormError, FormResult};
use crate::form::Form;
use crate::kind::ComponentKind;
use serde::Serialize;
use serde_json::{json, Value};

const PRESETS: &[&[f64]] = &[
    &[100.0],
    &[50.0, 50.0],
    &[33.3, 66.7],
    &[66.7, 33.3],
    &[25.0, 75.0],
    &[75.0, 25.0],
    &[33.3, 33.3, 33.3],
    &[25.0, 25.0, 50.0],
    &[50.0, 25.0, 25.0],
    &[25.0, 50.0, 25.0],
    &[25.0, 25.0, 25.0, 25.0],
    &[20.0, 20.0, 20.0, 20.0, 20.0],
    &[16.7, 16.7, 16.7, 16.7, 16.7, 16.7],
];

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// `round(100 / count, 1 decimal)`.
pub fn even_width(count: usize) -> f64 {
    if count == 0 {
        return 100.0;
    }
    round1(100.0 / count as f64)
}

pub fn format_width(width: f64) -> String {
    format!("{:.1}%", width)
}

pub fn parse_width(value: &str) -> FormResult<f64> {
    let trimmed = value.trim();
    let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
    number
        .parse::<f64>()
        .ok()
        .filter(|w| w.is_finite() && *w >= 0.0)
        .ok_or_else(|| FormError::InvalidWidth {
            value: value.to_string(),
        })
}

fn check_row(form: &Form, row: &str) -> FormResult<()> {
    match form.kind_of(row) {
        Some(ComponentKind::Row) => Ok(()),
        _ => Err(FormError::ComponentNotFound {
            kind: ComponentKind::Row.to_string(),
            id: row.to_string(),
        }),
    }
}

/// Current widths of `row`'s columns, in order. Unparseable widths read as 0.
pub fn widths(form: &Form, row: &str) -> Vec<f64> {
    form.children(row)
        .iter()
        .map(|col| {
            form.get_value(col, "config.width")
                .and_then(|v| v.as_str().map(str::to_string))
                .and_then(|s| parse_width(&s).ok())
                .unwrap_or(0.0)
        })
        .collect()
}

/// Give every column of `row` the same width.
pub fn redistribute(form: &mut Form, row: &str) -> FormResult<()> {
    check_row(form, row)?;
    let cols = form.children(row).to_vec();
    let width = format_width(even_width(cols.len()));
    for col in &cols {
        if form.get_value(col, "config.width").as_ref().and_then(Value::as_str) != Some(&width) {
            form.set(col, "config.width", json!(width))?;
        }
    }
    tracing::debug!(row = %row, columns = cols.len(), width = %width, "columns redistributed");
    Ok(())
}

/// Pixel geometry captured when a resize handle is grabbed.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeStart {
    pub row: String,
    pub left: String,
    pub right: String,
    pub left_px: f64,
    pub right_px: f64,
    pub row_px: f64,
}

/// Apply a handle drag of `delta_px` and store both widths.
///
/// Widths are `(start ± delta) / row × 100`, clamped so neither column
/// goes below zero. Returns the new `(left, right)` percentages.
pub fn resize(form: &mut Form, start: &ResizeStart, delta_px: f64) -> FormResult<(f64, f64)> {
    check_row(form, &start.row)?;
    for col in [&start.left, &start.right] {
        if form.parent(col) != Some(start.row.as_str()) {
            return Err(FormError::InvalidChild {
                parent: start.row.clone(),
                child: col.clone(),
            });
        }
    }
    if start.row_px <= 0.0 {
        return Err(FormError::InvalidWidth {
            value: start.row_px.to_string(),
        });
    }
    let total = start.left_px + start.right_px;
    let left_px = (start.left_px + delta_px).clamp(0.0, total);
    let right_px = total - left_px;
    let left = round1(left_px / start.row_px * 100.0);
    let right = round1(right_px / start.row_px * 100.0);
    form.set(&start.left, "config.width", json!(format_width(left)))?;
    form.set(&start.right, "config.width", json!(format_width(right)))?;
    Ok((left, right))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresetOption {
    /// Comma-joined widths, or `custom`.
    pub value: String,
    pub label: String,
    pub selected: bool,
}

fn preset_value(widths: &[f64]) -> String {
    widths
        .iter()
        .map(|w| format!("{}", round1(*w)))
        .collect::<Vec<_>>()
        .join(",")
}

fn preset_label(widths: &[f64]) -> String {
    widths
        .iter()
        .map(|w| format!("{}%", round1(*w)))
        .collect::<Vec<_>>()
        .join(" | ")
}

pub fn presets_for(count: usize) -> Vec<&'static [f64]> {
    PRESETS.iter().copied().filter(|p| p.len() == count).collect()
}

/// Preset choices for `row`, with the matching one selected.
///
/// When the live widths match no preset a `custom` entry is appended and
/// selected instead.
pub fn preset_options(form: &Form, row: &str) -> FormResult<Vec<PresetOption>> {
    check_row(form, row)?;
    let live = widths(form, row);
    let mut options: Vec<PresetOption> = presets_for(live.len())
        .into_iter()
        .map(|p| PresetOption {
            value: preset_value(p),
            label: preset_label(p),
            selected: p.len() == live.len()
                && p.iter().zip(&live).all(|(a, b)| (a - b).abs() < 0.05),
        })
        .collect();
    if !options.iter().any(|o| o.selected) {
        options.push(PresetOption {
            value: "custom".to_string(),
            label: preset_label(&live),
            selected: true,
        });
    }
    Ok(options)
}

/// Write the widths named by a preset value such as `"25,75"`.
pub fn apply_preset(form: &mut Form, row: &str, value: &str) -> FormResult<()> {
    check_row(form, row)?;
    let widths = value
        .split(',')
        .map(parse_width)
        .collect::<FormResult<Vec<f64>>>()?;
    let cols = form.children(row).to_vec();
    if widths.len() != cols.len() {
        return Err(FormError::InvalidWidth {
            value: value.to_string(),
        });
    }
    for (col, width) in cols.iter().zip(widths) {
        form.set(col, "config.width", json!(format_width(width)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row_with_columns(n: usize) -> (Form, String, Vec<String>) {
        let mut form = Form::new();
        let stage = form.stage_id().to_string();
        let row = form.add(ComponentKind::Row, Some(&stage), None, None).unwrap();
        let cols = (0..n)
            .map(|_| form.add(ComponentKind::Column, Some(&row), None, None).unwrap())
            .collect();
        (form, row, cols)
    }

    #[test]
    fn test_even_width() {
        assert_eq!(even_width(1), 100.0);
        assert_eq!(even_width(3), 33.3);
        assert_eq!(even_width(6), 16.7);
        assert_eq!(format_width(even_width(2)), "50.0%");
    }

    #[test]
    fn test_parse_width() {
        assert_eq!(parse_width("33.3%").unwrap(), 33.3);
        assert_eq!(parse_width("100").unwrap(), 100.0);
        assert!(parse_width("wide").is_err());
    }

    #[test]
    fn test_adding_columns_redistributes() {
        let (form, row, cols) = row_with_columns(3);
        assert_eq!(widths(&form, &row), vec![33.3, 33.3, 33.3]);
        assert_eq!(form.get_value(&cols[0], "config.width"), Some(json!("33.3%")));
    }

    #[test]
    fn test_resize_clamps() {
        let (mut form, row, cols) = row_with_columns(2);
        let start = ResizeStart {
            row: row.clone(),
            left: cols[0].clone(),
            right: cols[1].clone(),
            left_px: 500.0,
            right_px: 500.0,
            row_px: 1000.0,
        };
        assert_eq!(resize(&mut form, &start, 250.0).unwrap(), (75.0, 25.0));
        assert_eq!(resize(&mut form, &start, 900.0).unwrap(), (100.0, 0.0));
        assert_eq!(form.get_value(&cols[1], "config.width"), Some(json!("0.0%")));
    }

    #[test]
    fn test_preset_options_select_match_or_custom() {
        let (mut form, row, _) = row_with_columns(2);
        let options = preset_options(&form, &row).unwrap();
        assert_eq!(options.len(), 5);
        assert_eq!(options.iter().find(|o| o.selected).unwrap().value, "50,50");

        apply_preset(&mut form, &row, "25,75").unwrap();
        let options = preset_options(&form, &row).unwrap();
        assert_eq!(options.iter().find(|o| o.selected).unwrap().value, "25,75");

        apply_preset(&mut form, &row, "40,60").unwrap();
        let options = preset_options(&form, &row).unwrap();
        let custom = options.last().unwrap();
        assert_eq!(custom.value, "custom");
        assert!(custom.selected);
        assert_eq!(custom.label, "40% | 60%");
    }
}
