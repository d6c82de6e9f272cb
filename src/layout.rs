// Copyright 2020-2021 bd_
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions: The above copyright
// notice and this permission notice shall be included in all copies or
// substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

use anyhow::Result;
use chrono::NaiveDate;
use itertools::Itertools;

use crate::calendar::{header_text, CalendarDay};
use crate::config::PANEL_PADDING;

/// Reports the rendered width of a string, in whole pixels.
pub trait Measure {
    fn measure(&self, text: &str) -> Result<i32>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineMetrics {
    /// Height of every row below the title, spacing included.
    pub line_height: i32,
    /// Height of the title row, without extra spacing.
    pub first_line_height: i32,
}

impl LineMetrics {
    pub fn new(font_size: f64, spacing: f64, dpi: f64) -> Self {
        LineMetrics {
            line_height: (font_size * spacing * dpi / 72.0).ceil() as i32,
            first_line_height: (font_size * dpi / 72.0).ceil() as i32,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellSize {
    pub width: i32,
    pub height: i32,
}

/// A string to draw, positioned relative to the top-left of the calendar.
/// `baseline` is the y coordinate of the text baseline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlacedText {
    pub text: String,
    pub x: i32,
    pub baseline: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CalendarLayout {
    pub cell: CellSize,
    pub width: i32,
    pub height: i32,
    pub texts: Vec<PlacedText>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PanelRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

fn day_text(day: &CalendarDay) -> String {
    day.day().to_string()
}

pub fn measure_cell(
    measure: &dyn Measure,
    metrics: &LineMetrics,
    days: &[CalendarDay],
    weekdays: &[&str],
) -> Result<CellSize> {
    let widest = days
        .iter()
        .map(day_text)
        .chain(weekdays.iter().map(|label| label.to_string()))
        .map(|text| measure.measure(&text))
        .fold_ok(0, i32::max)?;

    Ok(CellSize {
        width: widest + measure.measure(" ")?,
        height: metrics.line_height,
    })
}

/// Returns the cell size along with the overall width and height of the grid.
pub fn measure_calendar(
    measure: &dyn Measure,
    metrics: &LineMetrics,
    days: &[CalendarDay],
    weekdays: &[&str],
) -> Result<(CellSize, i32, i32)> {
    let cell = measure_cell(measure, metrics, days, weekdays)?;

    // title + weekday header + one row per week
    let num_lines = (days.len() / 7) as i32 + 2;
    let width = cell.width * 7;
    let height = metrics.first_line_height + (num_lines - 1) * metrics.line_height;

    Ok((cell, width, height))
}

/// Positions the title, the weekday header and the day numbers. Days outside
/// the target month get no text.
pub fn layout_calendar(
    measure: &dyn Measure,
    metrics: &LineMetrics,
    days: &[CalendarDay],
    today: NaiveDate,
    weekdays: &[&str],
) -> Result<CalendarLayout> {
    let (cell, width, height) = measure_calendar(measure, metrics, days, weekdays)?;
    let dx = cell.width;
    let dy = metrics.line_height;

    let mut texts = Vec::with_capacity(days.len() + weekdays.len() + 1);

    let mut y = metrics.first_line_height;
    let header = header_text(today);
    let header_width = measure.measure(&header)?;
    texts.push(PlacedText {
        text: header,
        x: (width - header_width) / 2,
        baseline: y,
    });

    y += dy;
    for (col, label) in weekdays.iter().enumerate() {
        let diff = cell.width - measure.measure(label)?;
        texts.push(PlacedText {
            text: label.to_string(),
            x: col as i32 * dx + diff,
            baseline: y,
        });
    }

    y += dy;
    for (i, day) in days.iter().enumerate() {
        if !day.is_this_month() {
            continue;
        }

        let text = day_text(day);
        let diff = cell.width - measure.measure(&text)?;
        let (row, col) = (i / 7, i % 7);
        texts.push(PlacedText {
            text,
            x: col as i32 * dx + diff,
            baseline: y + row as i32 * dy,
        });
    }

    Ok(CalendarLayout {
        cell,
        width,
        height,
        texts,
    })
}

/// Places the calendar panel in the bottom-right corner of an image of the
/// given size, inset by `PANEL_PADDING`. The calendar is drawn from the
/// panel's top-left corner; coordinates may be negative for small images.
pub fn panel_rect(image_width: u32, image_height: u32, layout: &CalendarLayout) -> PanelRect {
    let max_x = image_width as i32;
    let max_y = image_height as i32;

    let x = max_x - layout.width - PANEL_PADDING * 2;
    let y = max_y - layout.height - PANEL_PADDING * 2;

    PanelRect {
        x,
        y,
        width: (layout.width + PANEL_PADDING) as u32,
        height: (layout.height + PANEL_PADDING) as u32,
    }
}
