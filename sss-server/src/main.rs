//! Demo settings server.
//!
//! Serves a sample settings page over WebSocket. The bind address defaults
//! to `127.0.0.1:7777` and can be given as the first argument; set
//! `RUST_LOG` to see client activity.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::info;
use sss_core::builder::{
    Button, Dropdown, GroupHeader, Keybind, PageBuilder, PlainText, Slider, TextArea, TwoButtons,
};
use sss_core::element::{FoldoutMode, KeyCode, TextAlignment};
use sss_core::{ElementId, InputContext, PageStore, PageTemplate};
use sss_server::{ServerConfig, SettingsServer};

const STATUS_TAG: &str = "status";
const NICKNAME_TAG: &str = "nickname";

fn tagged(ctx: &InputContext<'_>, tag: &str) -> Option<ElementId> {
    ctx.store
        .template()
        .definitions()
        .iter()
        .find(|d| d.tag() == Some(tag))
        .map(|d| d.id())
}

fn set_status(ctx: &InputContext<'_>, text: String) {
    if let Some(id) = tagged(ctx, STATUS_TAG) {
        if let Err(e) = ctx.store.update_text_area(ctx.client, id, text) {
            log::warn!("Status update failed: {e}");
        }
    }
}

fn demo_page() -> Result<PageTemplate, sss_core::BuildError> {
    let presses = Arc::new(AtomicU64::new(0));

    PageBuilder::new()
        .add_group_header(GroupHeader::new("Server-specific settings"))
        .add_button(
            Button::new("Test", "Click")
                .hold_time(2.0)
                .hint("Hold for two seconds")
                .on_interact(move |ctx| {
                    let n = presses.fetch_add(1, Ordering::Relaxed) + 1;
                    info!("{} pressed the test button ({n} total)", ctx.client);
                    set_status(ctx, format!("Test button pressed {n} times"));
                }),
        )
        .add_slider(
            Slider::new("Volume", 0.0, 100.0)
                .default_value(50.0)
                .integer()
                .display_format("{0}%")
                .on_changed(|ctx, value| info!("{} set volume to {value}", ctx.client)),
        )
        .add_dropdown(
            Dropdown::new("Difficulty", ["Easy", "Normal", "Hard"])
                .default_index(1)
                .on_changed(|ctx, index| {
                    let name = ctx.element.selected_option().unwrap_or("?");
                    info!("{} picked difficulty {index} ({name})", ctx.client);
                }),
        )
        .add_two_buttons(TwoButtons::new("Side", "Left", "Right").on_changed(|ctx, is_b| {
            let side = if is_b { "right" } else { "left" };
            info!("{} chose {side}", ctx.client);
        }))
        .add_plain_text(
            PlainText::new("Nickname")
                .placeholder("Type a nickname")
                .character_limit(24)
                .tag(NICKNAME_TAG)
                .on_changed(|ctx, text| set_status(ctx, format!("Hello, {text}!"))),
        )
        .add_keybind(
            Keybind::new("Clear nickname")
                .suggested_key(KeyCode(0x43))
                .on_input(|ctx, pressed| {
                    if !pressed {
                        return;
                    }
                    if let Some(id) = tagged(ctx, NICKNAME_TAG) {
                        if let Err(e) = ctx.store.clear_plain_text(ctx.client, id) {
                            log::warn!("Clear failed: {e}");
                        }
                    }
                }),
        )
        .add_text_area(
            TextArea::new("Welcome! Change any setting to see it logged on the server.")
                .foldout(FoldoutMode::ExtendedByDefault)
                .alignment(TextAlignment::Left)
                .tag(STATUS_TAG),
        )
        .on_user_input(|ctx| {
            let element = ctx.element;
            log::debug!("{} sent input for {} {}", ctx.client, element.kind(), element.id());
        })
        .build()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut config = ServerConfig::default();
    if let Some(addr) = std::env::args().nth(1) {
        config.bind_addr = addr;
    }

    let template = demo_page()?;
    info!("Built settings page with {} elements", template.len());

    let store = Arc::new(PageStore::new(template));
    let server = SettingsServer::new(store.clone(), config);

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    store.dispose();
    Ok(())
}
