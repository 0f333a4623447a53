// ============================================================================
// Gestion des événements
// ============================================================================
// Lecture clavier non bloquante : un Tick toutes les 250ms quand rien ne se
// passe, pour que la boucle principale récupère les résultats du worker et
// vérifie l'expiration du TTL.
// ============================================================================

use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event as CrosstermEvent, KeyCode, KeyEvent, KeyEventKind};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Événements de l'application
#[derive(Debug, Clone)]
pub enum Event {
    /// Touche pressée
    Key(KeyEvent),

    /// Rien reçu pendant POLL_INTERVAL
    Tick,
}

/// Gestionnaire d'événements
pub struct EventHandler;

impl EventHandler {
    pub fn new() -> Self {
        Self
    }

    /// Lit le prochain événement (bloquant au plus POLL_INTERVAL)
    pub fn next(&self) -> Result<Event> {
        if !event::poll(POLL_INTERVAL)? {
            return Ok(Event::Tick);
        }

        match event::read()? {
            // Sur certains OS on reçoit Press ET Release : on ne garde que Press
            CrosstermEvent::Key(key) if key.kind == KeyEventKind::Press => Ok(Event::Key(key)),
            // Resize, souris, Release
            _ => Ok(Event::Tick),
        }
    }
}

// ============================================================================
// Helpers : KeyEvent → action
// ============================================================================

fn key_matches(event: &Event, accept: impl Fn(KeyCode) -> bool) -> bool {
    match event {
        Event::Key(key) => accept(key.code),
        Event::Tick => false,
    }
}

/// 'q' : quitter (deux pressions)
pub fn is_quit_event(event: &Event) -> bool {
    key_matches(event, |code| matches!(code, KeyCode::Char('q') | KeyCode::Char('Q')))
}

/// 'r' : invalide le cache et relance la fanout
pub fn is_refresh_event(event: &Event) -> bool {
    key_matches(event, |code| matches!(code, KeyCode::Char('r') | KeyCode::Char('R')))
}

pub fn is_escape_event(event: &Event) -> bool {
    key_matches(event, |code| code == KeyCode::Esc)
}

pub fn is_space_event(event: &Event) -> bool {
    key_matches(event, |code| code == KeyCode::Char(' '))
}

pub fn is_enter_event(event: &Event) -> bool {
    key_matches(event, |code| code == KeyCode::Enter)
}

/// Flèche haut ou 'k' (vim)
pub fn is_up_event(event: &Event) -> bool {
    key_matches(event, |code| {
        matches!(code, KeyCode::Up | KeyCode::Char('k') | KeyCode::Char('K'))
    })
}

/// Flèche bas ou 'j' (vim)
pub fn is_down_event(event: &Event) -> bool {
    key_matches(event, |code| {
        matches!(code, KeyCode::Down | KeyCode::Char('j') | KeyCode::Char('J'))
    })
}

// ============================================================================
// Tests
// ============================================================================
