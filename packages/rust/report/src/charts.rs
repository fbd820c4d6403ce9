//! Plotly figure specs (`{ data, layout }`) built from [`ReportStats`].

use serde_json::{Value, json};

use crate::stats::{ReportStats, RunCount};

/// Points averaged by the trend line on the runs chart.
const TREND_WINDOW: usize = 3;

/// Jobs per run: scatter sized and coloured by count, plus a moving-average trend.
pub fn runs_figure(stats: &ReportStats) -> Value {
    let x: Vec<String> = stats.runs.iter().map(RunCount::run_id).collect();
    let y: Vec<usize> = stats.runs.iter().map(|r| r.count).collect();
    let max = y.iter().copied().max().unwrap_or(1).max(1) as f64;
    let sizes: Vec<f64> = y.iter().map(|&c| 10.0 + 20.0 * c as f64 / max).collect();

    json!({
        "data": [
            {
                "type": "scatter",
                "mode": "markers",
                "name": "Jobs found",
                "x": x,
                "y": y,
                "marker": {
                    "size": sizes,
                    "color": y,
                    "colorscale": "Viridis",
                    "showscale": true,
                    "line": { "width": 2, "color": "DarkSlateGrey" }
                },
                "hovertemplate": "%{x}<br>%{y} jobs<extra></extra>"
            },
            {
                "type": "scatter",
                "mode": "lines",
                "name": "Trend",
                "x": x,
                "y": moving_average(&y, TREND_WINDOW),
                "line": { "color": "#2575fc", "width": 2, "dash": "dot" },
                "hoverinfo": "skip"
            }
        ],
        "layout": {
            "title": { "text": "Jobs Per Scraping Run" },
            "xaxis": { "title": { "text": "Scraping Time" }, "type": "category" },
            "yaxis": { "title": { "text": "Jobs Found" }, "rangemode": "tozero" },
            "hovermode": "x unified",
            "showlegend": false,
            "height": 500
        }
    })
}

pub fn companies_figure(stats: &ReportStats) -> Value {
    horizontal_bar(&stats.top_companies, "Top Companies", "Job Count", 400)
}

pub fn keywords_figure(stats: &ReportStats) -> Value {
    horizontal_bar(
        &stats.keywords,
        "Most Common Keywords in Job Titles",
        "Count",
        500,
    )
}

pub fn sources_figure(stats: &ReportStats) -> Value {
    let labels: Vec<&str> = stats.sources.iter().map(|(s, _)| s.label()).collect();
    let values: Vec<usize> = stats.sources.iter().map(|(_, c)| *c).collect();

    json!({
        "data": [{
            "type": "pie",
            "labels": labels,
            "values": values,
            "hole": 0.3
        }],
        "layout": {
            "title": { "text": "Job Sources Distribution" },
            "height": 400
        }
    })
}

/// Ranked counts as a horizontal bar chart, highest on top.
fn horizontal_bar(ranked: &[(String, usize)], title: &str, x_title: &str, height: u32) -> Value {
    let labels: Vec<&str> = ranked.iter().map(|(l, _)| l.as_str()).collect();
    let counts: Vec<usize> = ranked.iter().map(|(_, c)| *c).collect();

    json!({
        "data": [{
            "type": "bar",
            "orientation": "h",
            "x": counts,
            "y": labels
        }],
        "layout": {
            "title": { "text": title },
            "xaxis": { "title": { "text": x_title } },
            "yaxis": { "autorange": "reversed", "automargin": true },
            "showlegend": false,
            "height": height
        }
    })
}

/// Trailing moving average; early points average what is available.
fn moving_average(values: &[usize], window: usize) -> Vec<f64> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let slice = &values[start..=i];
            slice.iter().sum::<usize>() as f64 / slice.len() as f64
        })
        .collect()
}
