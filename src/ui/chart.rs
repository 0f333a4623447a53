// ============================================================================
// Chart - Graphique en barres d'un indicateur
// ============================================================================
// Vue détail : description, seuil, raison d'indisponibilité, et un
// BarChart qui compare la valeur à son seuil (ou précédent / actuel /
// prévision pour les indicateurs à trois valeurs)
//
// CONCEPTS RATATUI :
// 1. BarChart : barres verticales, valeurs u64
// 2. Bar::text_value : le texte affiché peut différer de la hauteur
// ============================================================================

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::alert::ThresholdCheck;
use crate::app::{App, IndicatorRow};
use crate::models::Value;

/// Hauteur max d'une barre (les valeurs sont ramenées sur 0..=100)
const BAR_SCALE: f64 = 100.0;

/// Couleur d'une valeur selon son seuil
pub fn check_color(check: &ThresholdCheck) -> Color {
    match check {
        ThresholdCheck::Breach { .. } => Color::Red,
        ThresholdCheck::Within { .. } => Color::Green,
        ThresholdCheck::Indeterminate => Color::Gray,
    }
}

/// Ramène les valeurs sur 0..=100 proportionnellement à la plus grande
/// valeur absolue (BarChart n'accepte que des u64)
pub fn scale_bars(values: &[f64]) -> Vec<u64> {
    let max = values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if max == 0.0 || !max.is_finite() {
        return vec![0; values.len()];
    }
    values
        .iter()
        .map(|v| ((v.abs() / max) * BAR_SCALE).round() as u64)
        .collect()
}

/// (label, valeur, couleur) des barres d'une ligne ; placeholders ignorés
fn bar_series(row: &IndicatorRow) -> Vec<(&'static str, f64, Color)> {
    let value_color = check_color(&row.check);
    let mut series = Vec::new();

    match &row.value {
        Value::Scalar(value) => {
            if let Some(v) = value {
                series.push(("current", *v, value_color));
            }
        }
        Value::Triple(_) => {
            if let Some(v) = row.value.previous() {
                series.push(("previous", v, Color::DarkGray));
            }
            if let Some(v) = row.value.current() {
                series.push(("current", v, value_color));
            }
            if let Some(v) = row.value.forecast() {
                series.push(("forecast", v, Color::Blue));
            }
        }
    }

    if !series.is_empty() {
        if let Some(threshold) = row.threshold {
            series.push(("threshold", threshold, Color::Yellow));
        }
    }
    series
}

/// Dessine le BarChart d'un indicateur
pub fn render_value_chart(frame: &mut Frame, row: &IndicatorRow, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(" {} ", row.name));

    let series = bar_series(row);
    if series.is_empty() {
        let text = vec![
            Line::from(""),
            Line::from(Span::styled("unavailable", Style::default().fg(Color::Gray))),
        ];
        let paragraph = Paragraph::new(text).block(block).alignment(Alignment::Center);
        frame.render_widget(paragraph, area);
        return;
    }

    let heights = scale_bars(&series.iter().map(|(_, v, _)| *v).collect::<Vec<_>>());
    let bars: Vec<Bar> = series
        .iter()
        .zip(heights)
        .map(|((label, value, color), height)| {
            Bar::default()
                .value(height)
                .label(Line::from(*label))
                .text_value(format!("{:.2}", value))
                .style(Style::default().fg(*color))
                .value_style(Style::default().fg(Color::Black).bg(*color))
        })
        .collect();

    let chart = BarChart::default()
        .block(block)
        .data(BarGroup::default().bars(&bars))
        .bar_width(10)
        .bar_gap(2)
        .max(BAR_SCALE as u64);

    frame.render_widget(chart, area);
}

// ============================================================================
// Vue détail
// ============================================================================

/// Dessine la vue détail de l'indicateur sélectionné
pub fn render_detail(frame: &mut Frame, app: &App, area: Rect) {
    let Some(row) = app.selected_row() else {
        let paragraph = Paragraph::new("Aucun indicateur sélectionné")
            .block(Block::default().borders(Borders::ALL))
            .alignment(Alignment::Center);
        frame.render_widget(paragraph, area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7), // Infos
            Constraint::Min(0),    // Graphique
        ])
        .split(area)
        .to_vec();

    render_info(frame, row, chunks[0]);
    render_value_chart(frame, row, chunks[1]);
}

fn render_info(frame: &mut Frame, row: &IndicatorRow, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(
            " {} - {} ",
            row.name,
            row.category.map(|c| c.label()).unwrap_or("unregistered")
        ));

    let label = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
    let value_style = Style::default().fg(check_color(&row.check)).add_modifier(Modifier::BOLD);
    let unit = if row.unit.is_empty() { String::new() } else { format!(" {}", row.unit) };

    let mut lines = vec![
        Line::from(vec![
            Span::styled("Value: ", label),
            Span::styled(format!("{}{}", row.value, unit), value_style),
            Span::raw("   "),
            Span::styled("Threshold: ", label),
            Span::raw(row.threshold_label.clone()),
        ]),
        Line::from(vec![
            Span::styled("About: ", label),
            Span::raw(row.description.clone()),
        ]),
    ];

    if let Some(error) = &row.error {
        lines.push(Line::from(vec![
            Span::styled("Unavailable: ", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
            Span::styled(error.clone(), Style::default().fg(Color::Red)),
        ]));
    }

    lines.push(Line::from(vec![
        Span::styled("[ESC]", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
        Span::raw(" Retour"),
    ]));

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    fn row(value: Value, threshold: Option<f64>, check: ThresholdCheck) -> IndicatorRow {
        IndicatorRow {
            name: "VIX".to_string(),
            category: Some(Category::Risk),
            value,
            error: None,
            threshold,
            threshold_label: "20".to_string(),
            unit: "pts".to_string(),
            description: String::new(),
            check,
        }
    }

    #[test]
    fn test_scale_bars() {
        assert_eq!(scale_bars(&[10.0, -5.0, 2.5]), vec![100, 50, 25]);
        assert_eq!(scale_bars(&[0.0, 0.0]), vec![0, 0]);
        assert!(scale_bars(&[]).is_empty());
    }

    #[test]
    fn test_placeholder_has_no_bars() {
        let series = bar_series(&row(Value::Scalar(None), Some(20.0), ThresholdCheck::Indeterminate));
        assert!(series.is_empty());
    }

    #[test]
    fn test_breach_is_red_with_threshold_bar() {
        let check = ThresholdCheck::Breach { value: 25.0, threshold: 20.0 };
        let series = bar_series(&row(Value::scalar(25.0), Some(20.0), check));

        assert_eq!(series.len(), 2);
        assert_eq!(series[0], ("current", 25.0, Color::Red));
        assert_eq!(series[1].0, "threshold");
    }

    #[test]
    fn test_triple_skips_missing_forecast() {
        let series = bar_series(&row(
            Value::triple(Some(4.1), Some(4.3), None),
            None,
            ThresholdCheck::Indeterminate,
        ));
        let labels: Vec<_> = series.iter().map(|(l, _, _)| *l).collect();
        assert_eq!(labels, vec!["previous", "current"]);
    }
}
