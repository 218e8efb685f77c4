//! Page rotation and the colon-blink animation. Runs inside the render
//! context, under the same lock as the compositor. Rotation is a fixed
//! round-robin over the deployment's page set, suppressed while rotation is
//! disabled or a notification is showing; the colon toggle is independent of
//! both.

use crate::age_ms;
use crate::state::{Page, SharedState};

/// Colon blink half-period.
pub const COLON_INTERVAL_MS: u32 = 500;

/// Advance animations and page rotation for this instant.
pub fn tick(state: &mut SharedState, pages: &[Page], now_ms: u32) {
    if age_ms(now_ms, state.page.last_colon_toggle_ms) >= COLON_INTERVAL_MS {
        state.page.colon_visible = !state.page.colon_visible;
        state.page.last_colon_toggle_ms = now_ms;
    }

    if !state.config.rotation_enabled || state.notification.active || pages.is_empty() {
        return;
    }
    if age_ms(now_ms, state.page.last_page_change_ms) >= state.config.page_duration_ms {
        state.page.current_page = next_page(pages, state.page.current_page);
        state.page.last_page_change_ms = now_ms;
    }
}

fn next_page(pages: &[Page], current: Page) -> Page {
    match pages.iter().position(|p| *p == current) {
        Some(i) => pages[(i + 1) % pages.len()],
        // a page outside the rotation set (reachable via the page command)
        // hands control back to the start of the rotation
        None => pages[0],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &[Page] = &[Page::Clock, Page::Calendar, Page::Weather];
    const NO_CALENDAR: &[Page] = &[Page::Clock, Page::Weather];

    #[test]
    fn rotates_round_robin_after_page_duration() {
        let mut state = SharedState::default();
        tick(&mut state, FULL, 9_999);
        assert_eq!(state.page.current_page, Page::Clock);
        tick(&mut state, FULL, 10_000);
        assert_eq!(state.page.current_page, Page::Calendar);
        tick(&mut state, FULL, 20_000);
        assert_eq!(state.page.current_page, Page::Weather);
        tick(&mut state, FULL, 30_000);
        assert_eq!(state.page.current_page, Page::Clock);
    }

    #[test]
    fn two_page_deployment_skips_calendar() {
        let mut state = SharedState::default();
        tick(&mut state, NO_CALENDAR, 10_000);
        assert_eq!(state.page.current_page, Page::Weather);
        tick(&mut state, NO_CALENDAR, 20_000);
        assert_eq!(state.page.current_page, Page::Clock);
    }

    #[test]
    fn rotation_disabled_freezes_page() {
        let mut state = SharedState::default();
        state.config.rotation_enabled = false;
        tick(&mut state, FULL, 60_000);
        assert_eq!(state.page.current_page, Page::Clock);
    }

    #[test]
    fn active_notification_pauses_rotation_not_colon() {
        let mut state = SharedState::default();
        state.notification.active = true;
        let colon_before = state.page.colon_visible;
        tick(&mut state, FULL, 60_000);
        assert_eq!(state.page.current_page, Page::Clock);
        assert_ne!(state.page.colon_visible, colon_before);
    }

    #[test]
    fn colon_toggles_every_half_second() {
        let mut state = SharedState::default();
        assert!(state.page.colon_visible);
        tick(&mut state, FULL, 499);
        assert!(state.page.colon_visible);
        tick(&mut state, FULL, 500);
        assert!(!state.page.colon_visible);
        tick(&mut state, FULL, 1_000);
        assert!(state.page.colon_visible);
    }

    #[test]
    fn manually_selected_page_outside_set_returns_to_rotation() {
        let mut state = SharedState::default();
        state.page.current_page = Page::Calendar;
        tick(&mut state, NO_CALENDAR, 10_000);
        assert_eq!(state.page.current_page, Page::Clock);
    }

    #[test]
    fn custom_page_duration_applies() {
        let mut state = SharedState::default();
        state.config.page_duration_ms = 15_000;
        tick(&mut state, FULL, 14_999);
        assert_eq!(state.page.current_page, Page::Clock);
        tick(&mut state, FULL, 15_000);
        assert_eq!(state.page.current_page, Page::Calendar);
    }
}
