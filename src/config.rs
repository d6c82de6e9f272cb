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

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use image::Rgba;

use crate::layout::LineMetrics;

/// Gap between the panel and the image edges, and between the calendar text
/// and the panel's right/bottom edges.
pub const PANEL_PADDING: i32 = 20;

pub const PANEL_ALPHA: u8 = 125;

pub const RGBA_BLACK: Rgba<u8> = Rgba([0, 0, 0, 0xff]);
pub const RGBA_WHITE: Rgba<u8> = Rgba([0xff, 0xff, 0xff, 0xff]);

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hinting {
    None,
    /// Snap glyph advances to whole pixels
    Full,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Palette {
    pub foreground: Rgba<u8>,
    pub panel: Rgba<u8>,
}

#[derive(Parser, Debug)]
#[command(version, about = "Draws the current month's calendar onto an image")]
pub struct Config {
    /// Background image (JPEG or PNG)
    #[arg(long, env = "KALENDAR_IMGFILE", default_value = "infile.jpeg")]
    pub imgfile: PathBuf,

    /// Output PNG file
    #[arg(long, env = "KALENDAR_OUTFILE", default_value = "out.png")]
    pub outfile: PathBuf,

    /// Screen resolution in dots per inch
    #[arg(long, env = "KALENDAR_DPI", default_value_t = 72.0)]
    pub dpi: f64,

    /// TrueType font file
    #[arg(long, env = "KALENDAR_FONTFILE", default_value = "RobotoMono-SemiBold.ttf")]
    pub fontfile: PathBuf,

    #[arg(long, value_enum, env = "KALENDAR_HINTING", default_value_t = Hinting::None)]
    pub hinting: Hinting,

    /// Font size in points
    #[arg(long, env = "KALENDAR_SIZE", default_value_t = 12.0)]
    pub size: f64,

    /// Line spacing (e.g. 2 means double spaced)
    #[arg(long, env = "KALENDAR_SPACING", default_value_t = 1.5)]
    pub spacing: f64,

    /// White text on a black background
    #[arg(long, env = "KALENDAR_WHITEONBLACK")]
    pub whiteonblack: bool,

    /// Show the month containing this date (YYYY-MM-DD) instead of today's
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Also print the calendar as text
    #[arg(long)]
    pub text: bool,
}

impl Config {
    pub fn line_metrics(&self) -> LineMetrics {
        LineMetrics::new(self.size, self.spacing, self.dpi)
    }

    pub fn palette(&self) -> Palette {
        if self.whiteonblack {
            Palette {
                foreground: RGBA_WHITE,
                panel: Rgba([0, 0, 0, PANEL_ALPHA]),
            }
        } else {
            Palette {
                foreground: RGBA_BLACK,
                panel: Rgba([0xff, 0xff, 0xff, PANEL_ALPHA]),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENV_VARS: [&str; 8] = [
        "KALENDAR_IMGFILE",
        "KALENDAR_OUTFILE",
        "KALENDAR_DPI",
        "KALENDAR_FONTFILE",
        "KALENDAR_HINTING",
        "KALENDAR_SIZE",
        "KALENDAR_SPACING",
        "KALENDAR_WHITEONBLACK",
    ];

    /// Parses `args` with none of the configuration variables set.
    fn parse(args: &[&str]) -> Result<Config, clap::Error> {
        for var in ENV_VARS.iter() {
            std::env::remove_var(var);
        }
        Config::try_parse_from(args.iter().copied())
    }

    #[test]
    fn defaults() {
        let config = parse(&["kalendar"]).unwrap();

        assert_eq!(config.imgfile, PathBuf::from("infile.jpeg"));
        assert_eq!(config.outfile, PathBuf::from("out.png"));
        assert_eq!(config.fontfile, PathBuf::from("RobotoMono-SemiBold.ttf"));
        assert_eq!(config.hinting, Hinting::None);
        assert!(!config.whiteonblack);
        assert!(config.date.is_none());
        assert_eq!(
            config.line_metrics(),
            LineMetrics {
                line_height: 18,
                first_line_height: 12
            }
        );
        assert_eq!(config.palette().foreground, RGBA_BLACK);
    }

    #[test]
    fn explicit_flags() {
        let config = parse(&[
            "kalendar",
            "--imgfile",
            "bg.png",
            "--hinting",
            "full",
            "--size",
            "20",
            "--spacing",
            "2",
            "--dpi",
            "144",
            "--whiteonblack",
            "--date",
            "2024-02-01",
        ])
        .unwrap();

        assert_eq!(config.imgfile, PathBuf::from("bg.png"));
        assert_eq!(config.hinting, Hinting::Full);
        assert_eq!(config.date, NaiveDate::from_ymd_opt(2024, 2, 1));
        assert_eq!(config.line_metrics().line_height, 80);
        assert_eq!(config.line_metrics().first_line_height, 40);
        assert_eq!(config.palette().foreground, RGBA_WHITE);
        assert_eq!(config.palette().panel, Rgba([0, 0, 0, PANEL_ALPHA]));
    }

    #[test]
    fn rejects_unknown_hinting() {
        assert!(parse(&["kalendar", "--hinting", "slight"]).is_err());
    }
}
