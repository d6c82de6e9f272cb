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

mod calendar;
mod config;
mod layout;
mod render_prims;

use anyhow::Result;
use chrono::prelude::*;
use clap::Parser;
use std::rc::Rc;
use tracing::{debug, info, span, Level};
use tracing_subscriber::EnvFilter;

use calendar::WEEKDAYS;
use config::*;
use layout::{CalendarLayout, PanelRect};
use render_prims::*;

/// Lays the calendar text and its background panel out on top of the image.
fn compose_scene(
    face: &Rc<FontFace>,
    palette: &Palette,
    layout: CalendarLayout,
    panel: PanelRect,
) -> RenderGroup {
    let mut text = RenderGroup::new();
    for placed in layout.texts {
        let run = TextRun::new(face.clone(), placed.text, palette.foreground);
        text.push(run.offset(placed.x as f64, placed.baseline as f64));
    }

    let origin = (panel.x as f64, panel.y as f64);

    let mut scene = RenderGroup::new();
    scene.push(FillRect::rect(palette.panel, panel.width, panel.height).offset(origin.0, origin.1));
    scene.push(text.offset(origin.0, origin.1));

    scene
}

#[tracing::instrument(skip(config), fields(imgfile = ?config.imgfile))]
fn run(config: &Config) -> Result<()> {
    let face = FontFace::load(&config.fontfile, config.size, config.dpi, config.hinting)?;
    let face = Rc::new(face);

    let background = load_background(&config.imgfile)?;

    let (today, days) = match config.date {
        Some(date) => (date, calendar::month_grid(date)),
        None => {
            let now = Local::now();
            (now.date_naive(), calendar::build_month_grid(&now))
        }
    };
    debug!(
        %today,
        cells = days.len(),
        weekend_cells = days.iter().filter(|d| d.is_weekend()).count(),
        marked_today = days.iter().filter(|d| d.is_today()).count(),
        "Built month grid"
    );

    if config.text {
        for line in calendar::calendar_text(today) {
            println!("{}", line);
        }
    }

    let layout = {
        let span = span!(Level::INFO, "layout");
        let _enter = span.enter();

        layout::layout_calendar(&*face, &config.line_metrics(), &days, today, &WEEKDAYS)?
    };
    let panel = layout::panel_rect(background.width(), background.height(), &layout);
    debug!(
        cell = ?layout.cell,
        width = layout.width,
        height = layout.height,
        ?panel,
        "Computed layout"
    );

    let scene = compose_scene(&face, &config.palette(), layout, panel);

    info!("Rendering...");
    let mut canvas = Canvas::new(background);
    scene.render(&mut canvas)?;

    write_png(&canvas.into_image(), &config.outfile)?;
    println!("Wrote {} OK.", config.outfile.display());

    Ok(())
}

fn main() {
    let config = Config::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    info!("Starting calendar generation");

    if let Err(e) = run(&config) {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}
