//! Embedded chart model and the DrawingML chart part parser.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use crate::error::WorkbookError;
use crate::workbook::xml;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Scatter,
    Line,
    Bar,
    Area,
    Pie,
    Other(String),
}

impl ChartKind {
    fn from_element(local: &str) -> Self {
        match local {
            "scatterChart" => ChartKind::Scatter,
            "lineChart" | "line3DChart" => ChartKind::Line,
            "barChart" | "bar3DChart" => ChartKind::Bar,
            "areaChart" | "area3DChart" => ChartKind::Area,
            "pieChart" | "pie3DChart" | "doughnutChart" => ChartKind::Pie,
            other => ChartKind::Other(other.to_string()),
        }
    }

    pub(crate) fn element(&self) -> &str {
        match self {
            ChartKind::Scatter => "scatterChart",
            ChartKind::Line => "lineChart",
            ChartKind::Bar => "barChart",
            ChartKind::Area => "areaChart",
            ChartKind::Pie => "pieChart",
            ChartKind::Other(name) => name.as_str(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub id: Option<String>,
    /// `b`, `t`, `l` or `r`.
    pub position: Option<String>,
    pub title: Option<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trendline {
    pub kind: String,
    pub forward: Option<f64>,
    pub backward: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub x_ref: Option<String>,
    pub y_ref: Option<String>,
    pub trendlines: Vec<Trendline>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    pub kind: ChartKind,
    pub title: Option<String>,
    pub axes: Vec<Axis>,
    pub series: Vec<Series>,
}

impl Chart {
    pub fn new(kind: ChartKind) -> Self {
        Self {
            kind,
            title: None,
            axes: Vec::new(),
            series: Vec::new(),
        }
    }

    /// The horizontal axis: positioned at the bottom or top, else the first.
    pub fn x_axis(&self) -> Option<&Axis> {
        self.axes
            .iter()
            .find(|a| matches!(a.position.as_deref(), Some("b") | Some("t")))
            .or_else(|| self.axes.first())
    }

    /// The vertical axis: positioned left or right, else the second.
    pub fn y_axis(&self) -> Option<&Axis> {
        self.axes
            .iter()
            .find(|a| matches!(a.position.as_deref(), Some("l") | Some("r")))
            .or_else(|| self.axes.get(1))
    }

    pub fn trendlines(&self) -> impl Iterator<Item = &Trendline> {
        self.series.iter().flat_map(|s| s.trendlines.iter())
    }

    pub fn has_trendline(&self) -> bool {
        self.trendlines().next().is_some()
    }

    /// The largest forward projection across all trendlines, zero when none.
    pub fn max_forward(&self) -> f64 {
        self.trendlines()
            .filter_map(|t| t.forward)
            .fold(0.0, f64::max)
    }
}

enum TitleOwner {
    Chart,
    Axis,
}

/// Parses one `xl/charts/chartN.xml` part.
pub fn parse_chart_xml(part: &str, content: &str) -> Result<Option<Chart>, WorkbookError> {
    // Text is not trimmed: entity references split a run into several
    // events and the spaces between them are significant.
    let mut reader = Reader::from_str(content);

    let mut stack: Vec<String> = Vec::new();
    let mut chart: Option<Chart> = None;
    let mut chart_title: Option<String> = None;
    let mut axes: Vec<Axis> = Vec::new();
    let mut series: Vec<Series> = Vec::new();

    let mut title_owner: Option<TitleOwner> = None;
    let mut title_buf = String::new();
    let mut ref_buf = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                let parent = stack.last().map(|s| s.as_str());
                match local.as_str() {
                    name if parent == Some("plotArea") && name.ends_with("Chart") => {
                        if chart.is_none() {
                            chart = Some(Chart::new(ChartKind::from_element(name)));
                        }
                    }
                    "valAx" | "catAx" | "dateAx" | "serAx" => axes.push(Axis::default()),
                    "ser" => series.push(Series::default()),
                    "trendline" => {
                        if let Some(s) = series.last_mut() {
                            s.trendlines.push(Trendline {
                                kind: "linear".to_string(),
                                forward: None,
                                backward: None,
                            });
                        }
                    }
                    "title" => {
                        title_owner = match parent {
                            Some("chart") => Some(TitleOwner::Chart),
                            Some("valAx") | Some("catAx") | Some("dateAx") | Some("serAx") => {
                                Some(TitleOwner::Axis)
                            }
                            _ => None,
                        };
                        title_buf.clear();
                    }
                    "f" => ref_buf.clear(),
                    _ => {}
                }
                apply_value_attrs(e, &local, parent, &mut axes, &mut series);
                stack.push(local);
            }
            Ok(Event::Empty(ref e)) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                let parent = stack.last().map(|s| s.as_str());
                apply_value_attrs(e, &local, parent, &mut axes, &mut series);
            }
            Ok(Event::Text(ref e)) => {
                let current = stack.last().map(|s| s.as_str());
                if title_owner.is_some() && matches!(current, Some("t") | Some("v")) {
                    title_buf.push_str(&xml::text(e));
                } else if current == Some("f") {
                    ref_buf.push_str(&xml::text(e));
                }
            }
            Ok(Event::GeneralRef(ref e)) => {
                let current = stack.last().map(|s| s.as_str());
                if title_owner.is_some() && matches!(current, Some("t") | Some("v")) {
                    title_buf.push_str(&xml::general_ref(e));
                } else if current == Some("f") {
                    ref_buf.push_str(&xml::general_ref(e));
                }
            }
            Ok(Event::End(ref e)) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                stack.pop();
                match local.as_str() {
                    "title" => {
                        let text = title_buf.trim().to_string();
                        let text = (!text.is_empty()).then_some(text);
                        match title_owner.take() {
                            Some(TitleOwner::Chart) => chart_title = text,
                            Some(TitleOwner::Axis) => {
                                if let Some(axis) = axes.last_mut() {
                                    axis.title = text;
                                }
                            }
                            None => {}
                        }
                    }
                    "f" if title_owner.is_none() => {
                        let target = stack.iter().rev().find(|s| {
                            matches!(s.as_str(), "xVal" | "cat" | "yVal" | "val")
                        });
                        if let (Some(target), Some(s)) = (target, series.last_mut()) {
                            let reference = Some(ref_buf.trim().to_string());
                            match target.as_str() {
                                "xVal" | "cat" => s.x_ref = reference,
                                _ => s.y_ref = reference,
                            }
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(WorkbookError::Xml {
                    part: part.to_string(),
                    reason: e.to_string(),
                });
            }
            _ => {}
        }
    }

    Ok(chart.map(|mut c| {
        c.title = chart_title;
        c.axes = axes;
        c.series = series;
        c
    }))
}

/// Handles the `val="..."` leaf elements that carry axis and trendline data.
fn apply_value_attrs(
    e: &quick_xml::events::BytesStart<'_>,
    local: &str,
    parent: Option<&str>,
    axes: &mut [Axis],
    series: &mut [Series],
) {
    let in_axis = matches!(parent, Some("valAx") | Some("catAx") | Some("dateAx") | Some("serAx"));
    match (local, parent) {
        ("axId", _) if in_axis => {
            if let Some(axis) = axes.last_mut() {
                axis.id = xml::attr(e, b"val");
            }
        }
        ("axPos", _) if in_axis => {
            if let Some(axis) = axes.last_mut() {
                axis.position = xml::attr(e, b"val");
            }
        }
        ("max", Some("scaling")) => {
            if let Some(axis) = axes.last_mut() {
                axis.max = xml::attr_f64(e, b"val");
            }
        }
        ("min", Some("scaling")) => {
            if let Some(axis) = axes.last_mut() {
                axis.min = xml::attr_f64(e, b"val");
            }
        }
        ("trendlineType", Some("trendline")) => {
            if let Some(t) = series.last_mut().and_then(|s| s.trendlines.last_mut()) {
                if let Some(kind) = xml::attr(e, b"val") {
                    t.kind = kind;
                }
            }
        }
        ("forward", Some("trendline")) => {
            if let Some(t) = series.last_mut().and_then(|s| s.trendlines.last_mut()) {
                t.forward = xml::attr_f64(e, b"val");
            }
        }
        ("backward", Some("trendline")) => {
            if let Some(t) = series.last_mut().and_then(|s| s.trendlines.last_mut()) {
                t.backward = xml::attr_f64(e, b"val");
            }
        }
        _ => {}
    }
}

/// Serializes a chart back to a minimal chart part. The writer uses this for
/// generated workbooks; it round-trips through [`parse_chart_xml`].
pub fn chart_to_xml(chart: &Chart) -> String {
    let mut out = String::new();
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    out.push_str(r#"<c:chartSpace xmlns:c="http://schemas.openxmlformats.org/drawingml/2006/chart" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><c:chart>"#);
    if let Some(title) = &chart.title {
        out.push_str(&title_xml(title));
        out.push_str(r#"<c:autoTitleDeleted val="0"/>"#);
    }
    out.push_str("<c:plotArea>");
    out.push_str(&format!("<c:{}>", chart.kind.element()));
    if chart.kind == ChartKind::Scatter {
        out.push_str(r#"<c:scatterStyle val="lineMarker"/>"#);
    }
    for (idx, s) in chart.series.iter().enumerate() {
        out.push_str(&format!(r#"<c:ser><c:idx val="{0}"/><c:order val="{0}"/>"#, idx));
        for t in &s.trendlines {
            out.push_str("<c:trendline>");
            out.push_str(&format!(r#"<c:trendlineType val="{}"/>"#, xml::escape(&t.kind)));
            if let Some(f) = t.forward {
                out.push_str(&format!(r#"<c:forward val="{}"/>"#, f));
            }
            if let Some(b) = t.backward {
                out.push_str(&format!(r#"<c:backward val="{}"/>"#, b));
            }
            out.push_str("</c:trendline>");
        }
        let (x_tag, y_tag) = if chart.kind == ChartKind::Scatter {
            ("xVal", "yVal")
        } else {
            ("cat", "val")
        };
        if let Some(x) = &s.x_ref {
            out.push_str(&format!(
                "<c:{0}><c:numRef><c:f>{1}</c:f></c:numRef></c:{0}>",
                x_tag,
                xml::escape(x)
            ));
        }
        if let Some(y) = &s.y_ref {
            out.push_str(&format!(
                "<c:{0}><c:numRef><c:f>{1}</c:f></c:numRef></c:{0}>",
                y_tag,
                xml::escape(y)
            ));
        }
        out.push_str("</c:ser>");
    }
    for axis in &chart.axes {
        if let Some(id) = &axis.id {
            out.push_str(&format!(r#"<c:axId val="{}"/>"#, xml::escape(id)));
        }
    }
    out.push_str(&format!("</c:{}>", chart.kind.element()));
    for axis in &chart.axes {
        out.push_str("<c:valAx>");
        if let Some(id) = &axis.id {
            out.push_str(&format!(r#"<c:axId val="{}"/>"#, xml::escape(id)));
        }
        out.push_str("<c:scaling>");
        if let Some(max) = axis.max {
            out.push_str(&format!(r#"<c:max val="{}"/>"#, max));
        }
        if let Some(min) = axis.min {
            out.push_str(&format!(r#"<c:min val="{}"/>"#, min));
        }
        out.push_str("</c:scaling>");
        if let Some(pos) = &axis.position {
            out.push_str(&format!(r#"<c:axPos val="{}"/>"#, xml::escape(pos)));
        }
        if let Some(title) = &axis.title {
            out.push_str(&title_xml(title));
        }
        out.push_str("</c:valAx>");
    }
    out.push_str("</c:plotArea></c:chart></c:chartSpace>");
    out
}

fn title_xml(text: &str) -> String {
    format!(
        "<c:title><c:tx><c:rich><a:p><a:r><a:t>{}</a:t></a:r></a:p></c:rich></c:tx></c:title>",
        xml::escape(text)
    )
}
