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

use chrono::prelude::*;
use itertools::Itertools;

/// Weekday header labels, Monday first.
pub const WEEKDAYS: [&str; 7] = ["Mo", "Di", "Mi", "Do", "Fr", "Sa", "So"];

const HEADER_FORMAT: &str = "%B %Y";
const BLANK_CELL: &str = "   ";

/// One cell of the month grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CalendarDay {
    date: NaiveDate,
    today: bool,
    weekend: bool,
    this_month: bool,
}

impl CalendarDay {
    pub fn new(date: NaiveDate, today: NaiveDate) -> Self {
        let weekday = date.weekday();

        CalendarDay {
            date,
            today: date == today,
            weekend: weekday == Weekday::Sat || weekday == Weekday::Sun,
            this_month: date.month() == today.month() && date.year() == today.year(),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn day(&self) -> u32 {
        self.date.day()
    }

    pub fn is_today(&self) -> bool {
        self.today
    }

    pub fn is_weekend(&self) -> bool {
        self.weekend
    }

    pub fn is_this_month(&self) -> bool {
        self.this_month
    }
}

// The walks below step a single day at a time. They stop at the edge of the
// representable date range rather than overflowing.

fn first_month_day(mut dt: NaiveDate) -> NaiveDate {
    let month = dt.month();
    while let Some(prev) = dt.pred_opt() {
        if prev.month() != month {
            break;
        }
        dt = prev;
    }
    dt
}

fn last_month_day(mut dt: NaiveDate) -> NaiveDate {
    let month = dt.month();
    while let Some(next) = dt.succ_opt() {
        if next.month() != month {
            break;
        }
        dt = next;
    }
    dt
}

fn first_week_day(mut dt: NaiveDate) -> NaiveDate {
    while dt.weekday() != Weekday::Mon {
        match dt.pred_opt() {
            Some(prev) => dt = prev,
            None => break,
        }
    }
    dt
}

fn last_week_day(mut dt: NaiveDate) -> NaiveDate {
    while dt.weekday() != Weekday::Sun {
        match dt.succ_opt() {
            Some(next) => dt = next,
            None => break,
        }
    }
    dt
}

fn iter_days(first_day: NaiveDate, last_day: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    first_day.iter_days().take_while(move |dt| *dt <= last_day)
}

/// Builds the grid for the month containing `today`: whole weeks from the
/// Monday on or before the 1st through the Sunday on or after the last day.
pub fn month_grid(today: NaiveDate) -> Vec<CalendarDay> {
    let first_day = first_week_day(first_month_day(today));
    let last_day = last_week_day(last_month_day(today));

    iter_days(first_day, last_day)
        .map(|dt| CalendarDay::new(dt, today))
        .collect()
}

/// Like [`month_grid`], taking the local date of `reference` as today.
pub fn build_month_grid<Tz: TimeZone>(reference: &DateTime<Tz>) -> Vec<CalendarDay> {
    month_grid(reference.date_naive())
}

pub fn header_text(today: NaiveDate) -> String {
    today.format(HEADER_FORMAT).to_string()
}

/// Plain text rendition of the month, one string per line.
pub fn calendar_text(today: NaiveDate) -> Vec<String> {
    let days = month_grid(today);

    let mut lines = Vec::with_capacity(days.len() / 7 + 2);
    lines.push(format!("{}{}", BLANK_CELL, header_text(today)));
    lines.push(WEEKDAYS.iter().join(" "));

    let mut line = String::new();
    for day in days.iter() {
        if day.is_this_month() {
            line += &format!("{:2} ", day.day());
        } else {
            line += BLANK_CELL;
        }

        if day.date().weekday() == Weekday::Sun {
            lines.push(std::mem::take(&mut line));
        }
    }

    lines
}
