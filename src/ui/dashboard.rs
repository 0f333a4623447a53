// ============================================================================
// Dashboard - Rendu de l'interface principale
// ============================================================================
// Header : âge du snapshot et état du cache (FRESH / STALE)
// Contenu : tableau des indicateurs à gauche, graphique de la ligne
//           sélectionnée à droite
// Footer : raccourcis, confirmation de quit, statut (erreur en rouge)
//
// CONCEPTS RATATUI :
// 1. Table + TableState : sélection surlignée
// 2. Layout imbriqués : vertical puis horizontal
// ============================================================================

use chrono::Utc;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use crate::app::{App, Screen, StatusMessage};
use crate::ui::chart;

/// Dessine l'interface complète
pub fn render(frame: &mut Frame, app: &App) {
    let chunks = create_layout(frame.size());

    render_header(frame, app, chunks[0]);

    match app.current_screen {
        Screen::Dashboard => render_main_content(frame, app, chunks[1]),
        Screen::Detail => chart::render_detail(frame, app, chunks[1]),
    }

    render_footer(frame, app, chunks[2]);
}

/// Crée le layout principal (header, content, footer)
fn create_layout(area: Rect) -> Vec<Rect> {
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Content
            Constraint::Length(4), // Footer : raccourcis + statut
        ])
        .split(area)
        .to_vec()
}

/// "42s", "17m", "3h05"
pub fn format_age(age: chrono::Duration) -> String {
    let secs = age.num_seconds().max(0);
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{}h{:02}", secs / 3600, (secs % 3600) / 60)
    }
}

// ============================================================================
// Header
// ============================================================================

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" EconMirror ")
        .title_alignment(Alignment::Center);

    let now = Utc::now();
    let mut spans = Vec::new();

    match (&app.snapshot, app.snapshot_age(now)) {
        (Some(snapshot), Some(age)) => {
            let fresh = age.to_std().map(|a| a < app.ttl).unwrap_or(false);
            let (state, color) = if fresh { ("FRESH", Color::Green) } else { ("STALE", Color::Yellow) };

            spans.push(Span::styled(state, Style::default().fg(color).add_modifier(Modifier::BOLD)));
            spans.push(Span::raw(format!(
                "  snapshot {} ago ({})",
                format_age(age),
                snapshot.taken_at.format("%Y-%m-%d %H:%M UTC")
            )));

            let unavailable = snapshot.unavailable_count();
            if unavailable > 0 {
                spans.push(Span::styled(
                    format!("  {} unavailable", unavailable),
                    Style::default().fg(Color::Gray),
                ));
            }
        }
        _ => spans.push(Span::styled("No snapshot yet", Style::default().fg(Color::Gray))),
    }

    if app.is_loading_data() {
        let message = app.loading_message.as_deref().unwrap_or("Loading...");
        spans.push(Span::styled(format!("  ⟳ {}", message), Style::default().fg(Color::Cyan)));
    }

    let paragraph = Paragraph::new(Line::from(spans)).block(block).alignment(Alignment::Center);
    frame.render_widget(paragraph, area);
}

// ============================================================================
// Main Content : tableau + graphique
// ============================================================================

fn render_main_content(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" 📊 Indicators ");

    if app.rows.is_empty() {
        let message = if app.is_loading_data() { "Fetching indicators..." } else { "No data" };
        let text = vec![
            Line::from(""),
            Line::from(Span::styled(message, Style::default().fg(Color::Gray))),
        ];
        let paragraph = Paragraph::new(text).block(block).alignment(Alignment::Center);
        frame.render_widget(paragraph, area);
        return;
    }

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area)
        .to_vec();

    let header = Row::new(vec!["Category", "Indicator", "Value", "Threshold"])
        .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = app
        .rows
        .iter()
        .map(|row| {
            let value_cell = if row.is_available() {
                let unit = if row.unit.is_empty() { String::new() } else { format!(" {}", row.unit) };
                Cell::from(format!("{}{}", row.value, unit)).style(Style::default().fg(chart::check_color(&row.check)))
            } else {
                Cell::from("✗ unavailable").style(Style::default().fg(Color::DarkGray))
            };

            Row::new(vec![
                Cell::from(row.category.map(|c| c.label()).unwrap_or("-")),
                Cell::from(row.name.clone()),
                value_cell,
                Cell::from(row.threshold_label.clone()),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(18),
        Constraint::Min(20),
        Constraint::Length(22),
        Constraint::Length(20),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .highlight_style(Style::default().add_modifier(Modifier::BOLD).add_modifier(Modifier::REVERSED));

    let mut state = TableState::default();
    state.select(Some(app.selected_index));
    frame.render_stateful_widget(table, columns[0], &mut state);

    if let Some(row) = app.selected_row() {
        chart::render_value_chart(frame, row, columns[1]);
    }
}

// ============================================================================
// Footer
// ============================================================================

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let key = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);

    let shortcuts = if app.is_awaiting_quit_confirmation() {
        Line::from(vec![
            Span::styled("⚠  Appuyez sur ", key),
            Span::styled(
                "[q]",
                Style::default()
                    .fg(Color::Red)
                    .add_modifier(Modifier::BOLD)
                    .add_modifier(Modifier::SLOW_BLINK),
            ),
            Span::styled(" à nouveau pour quitter, ou n'importe quelle autre touche pour annuler ⚠", key),
        ])
    } else {
        Line::from(vec![
            Span::styled("[q]", key),
            Span::raw(" Quit  "),
            Span::styled("[↑↓ / j k]", key),
            Span::raw(" Navigate  "),
            Span::styled("[Enter]", key),
            Span::raw(" Detail  "),
            Span::styled("[r]", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
            Span::raw(" Refresh"),
        ])
    };

    let status = match &app.status {
        Some(StatusMessage::Error(message)) => Line::from(Span::styled(
            format!("✗ {}", message),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Some(StatusMessage::Info(message)) => {
            Line::from(Span::styled(message.clone(), Style::default().fg(Color::Gray)))
        }
        None => Line::from(""),
    };

    let paragraph = Paragraph::new(vec![shortcuts, status])
        .block(block)
        .alignment(Alignment::Center);

    frame.render_widget(paragraph, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_age() {
        assert_eq!(format_age(chrono::Duration::seconds(42)), "42s");
        assert_eq!(format_age(chrono::Duration::seconds(17 * 60 + 5)), "17m");
        assert_eq!(format_age(chrono::Duration::seconds(3 * 3600 + 5 * 60)), "3h05");
        assert_eq!(format_age(chrono::Duration::seconds(-10)), "0s");
    }
}
