use anyhow::{anyhow, Context};
use eframe::egui;
use egui::{Color32, CornerRadius, RichText, ScrollArea, Stroke, Ui, ViewportBuilder};
use std::sync::Arc;

mod batch;
mod comments;
mod config;
mod controller;
mod error;
mod format;
mod hn_client;
mod logging;
mod models;
mod stories;
mod task;
mod theme;
#[cfg(test)]
mod testing;

use crate::comments::ThreadState;
use crate::controller::ReaderController;
use crate::format::{clean_html, format_timestamp, time_ago, truncate_title, TITLE_PREVIEW_CHARS};
use crate::hn_client::HackerNewsClient;
use crate::models::{ChildrenState, CommentNode, Story};
use crate::theme::AppTheme;

fn main() -> anyhow::Result<()> {
    logging::init_logging();
    let settings = config::load_settings();
    tracing::info!(api = %settings.api_base_url, story_limit = settings.story_limit, "starting reader");

    // Network work runs here; the UI thread only drains results
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("hn-reader-io")
        .build()
        .context("failed to build async runtime")?;

    let client = HackerNewsClient::new(&settings).context("failed to create HTTP client")?;
    let controller = ReaderController::new(runtime.handle().clone(), Arc::new(client), &settings);

    let options = eframe::NativeOptions {
        viewport: ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([800.0, 600.0])
            .with_title("Hacker News Reader"),
        ..Default::default()
    };

    eframe::run_native(
        "Hacker News Reader",
        options,
        Box::new(|cc| {
            let mut app = HackerNewsReaderApp::new(controller, cc.egui_ctx.clone());

            if let Some(is_dark_mode) = cc.storage.and_then(stored_dark_mode) {
                app.is_dark_mode = is_dark_mode;
                app.theme = AppTheme::for_mode(is_dark_mode);
            }

            Ok(Box::new(app))
        }),
    )
    .map_err(|e| anyhow!("failed to run the reader window: {e}"))?;

    Ok(())
}

const DARK_MODE_KEY: &str = "is_dark_mode";

fn stored_dark_mode(storage: &dyn eframe::Storage) -> Option<bool> {
    storage.get_string(DARK_MODE_KEY)?.parse::<bool>().ok()
}

// Clicks collected while rendering, applied once the frame is laid out
enum CommentAction {
    Toggle(u64),
    Retry(u64),
}

struct HackerNewsReaderApp {
    controller: ReaderController,
    theme: AppTheme,
    is_dark_mode: bool,
    search_input: String,
}

impl HackerNewsReaderApp {
    fn new(mut controller: ReaderController, ctx: egui::Context) -> Self {
        controller.set_repaint_hook(move || ctx.request_repaint());

        Self {
            controller,
            theme: AppTheme::dark(),
            is_dark_mode: true,
            search_input: String::new(),
        }
    }

    fn open_link(&self, url: &str) {
        if let Err(e) = open::that(url) {
            tracing::warn!(url, "failed to open link: {e}");
        }
    }

    fn toggle_theme(&mut self) {
        self.is_dark_mode = !self.is_dark_mode;
        self.theme = AppTheme::for_mode(self.is_dark_mode);
    }

    fn process_keyboard_shortcuts(&mut self, ctx: &egui::Context) {
        let (refresh, back) = ctx.input(|i| {
            (
                i.modifiers.command && i.key_pressed(egui::Key::R),
                i.key_pressed(egui::Key::Escape),
            )
        });

        if refresh {
            if self.controller.thread().is_some() {
                self.controller.refresh_comments();
            } else {
                self.controller.refresh();
            }
        }
        if back && self.controller.thread().is_some() {
            self.controller.close_story();
        }
    }

    fn render_header(&mut self, ui: &mut Ui) {
        ui.horizontal(|ui| {
            ui.heading(
                RichText::new("Hacker News Reader")
                    .color(self.theme.highlight)
                    .size(24.0),
            );
            ui.add_space(12.0);

            if let Some(updated) = self.controller.last_updated() {
                ui.label(
                    RichText::new(format!(
                        "{} stories, updated {}",
                        self.controller.stories().len(),
                        updated.format("%H:%M:%S")
                    ))
                        .color(self.theme.secondary_text)
                        .size(13.0),
                );
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let theme_icon = if self.is_dark_mode { "☀" } else { "🌙" };
                let theme_btn = ui.add(
                    egui::Button::new(RichText::new(theme_icon).size(18.0))
                        .min_size(egui::Vec2::new(32.0, 32.0))
                        .corner_radius(CornerRadius::same(16))
                        .fill(self.theme.button_background),
                );
                if theme_btn.clicked() {
                    self.toggle_theme();
                }

                ui.add_space(8.0);
                let refresh_btn = ui.add_enabled(
                    !self.controller.is_loading(),
                    egui::Button::new(
                        RichText::new("Refresh")
                            .color(self.theme.button_foreground)
                            .size(15.0),
                    )
                    .min_size(egui::Vec2::new(80.0, 32.0))
                    .corner_radius(CornerRadius::same(6))
                    .fill(self.theme.button_background),
                );
                if refresh_btn.clicked() {
                    self.controller.refresh();
                }
                if self.controller.is_loading() {
                    ui.spinner();
                }
            });
        });
    }

    fn render_error_banner(&mut self, ui: &mut Ui) {
        let Some(message) = self.controller.error().map(str::to_string) else {
            return;
        };

        let mut dismissed = false;
        egui::Frame::new()
            .fill(self.theme.error_background)
            .corner_radius(CornerRadius::same(6))
            .stroke(Stroke::new(1.0, self.theme.error))
            .inner_margin(8.0)
            .outer_margin(egui::vec2(8.0, 4.0))
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.label(RichText::new(&message).color(self.theme.error));
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        dismissed = ui.small_button("Dismiss").clicked();
                    });
                });
            });

        if dismissed {
            self.controller.dismiss_error();
        }
    }

    fn render_search_bar(&mut self, ui: &mut Ui) {
        ui.horizontal(|ui| {
            let response = ui.add(
                egui::TextEdit::singleline(&mut self.search_input)
                    .hint_text("Search news")
                    .desired_width(ui.available_width() - 80.0),
            );
            if !self.search_input.is_empty() && ui.button("Clear").clicked() {
                self.search_input.clear();
                response.request_focus();
            }
        });
        // filtering is cheap, so recompute on every change
        self.controller.set_query(&self.search_input);
    }

    fn render_stories_table(&mut self, ui: &mut Ui) {
        let mut story_to_view = None;
        let stories = self.controller.visible_stories().to_vec();

        if stories.is_empty() {
            ui.vertical_centered(|ui| {
                ui.add_space(20.0);
                let message = if !self.controller.query().is_empty() {
                    format!("No results found for '{}'", self.controller.query())
                } else if self.controller.is_loading() {
                    "Loading stories...".to_string()
                } else {
                    "No stories to show".to_string()
                };
                ui.label(
                    RichText::new(message)
                        .color(self.theme.secondary_text)
                        .size(18.0)
                        .italics(),
                );
            });
            return;
        }

        ScrollArea::vertical()
            .id_salt("stories_scroll")
            .auto_shrink([false; 2])
            .show(ui, |ui| {
                for (index, story) in stories.iter().enumerate() {
                    if self.render_story_card(ui, index + 1, story) {
                        story_to_view = Some(story.clone());
                    }
                }
            });

        if let Some(story) = story_to_view {
            self.controller.open_story(story);
        }
    }

    // Returns true when the comments link was clicked
    fn render_story_card(&self, ui: &mut Ui, rank: usize, story: &Story) -> bool {
        let mut open_comments = false;

        egui::Frame::new()
            .fill(self.theme.card_background)
            .corner_radius(CornerRadius::same(8))
            .stroke(self.theme.card_stroke(story.score))
            .inner_margin(12.0)
            .outer_margin(egui::vec2(8.0, 6.0))
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.label(
                        RichText::new(format!("{}", rank))
                            .color(self.theme.secondary_text)
                            .size(16.0),
                    );
                    ui.add_space(8.0);

                    let title_label = ui
                        .add(
                            egui::Label::new(
                                RichText::new(truncate_title(&story.title, TITLE_PREVIEW_CHARS))
                                    .color(self.theme.text)
                                    .size(16.0)
                                    .strong(),
                            )
                            .sense(egui::Sense::click()),
                        )
                        .on_hover_text(story.title.as_str());
                    if title_label.clicked() {
                        self.open_link(&story.link());
                    }
                    if title_label.hovered() {
                        ui.output_mut(|o| o.cursor_icon = egui::CursorIcon::PointingHand);
                    }

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.label(
                            RichText::new(format!("{} pts", story.score))
                                .color(self.theme.score_color(story.score))
                                .strong(),
                        );
                    });
                });

                ui.horizontal(|ui| {
                    ui.label(RichText::new("by").color(self.theme.secondary_text).size(14.0));
                    ui.label(RichText::new(&story.by).color(self.theme.accent).size(14.0));
                    ui.add_space(8.0);
                    ui.label(
                        RichText::new(format_timestamp(story.time))
                            .color(self.theme.secondary_text)
                            .size(14.0),
                    );
                    ui.add_space(8.0);

                    let comments_btn = ui.add(
                        egui::Button::new(
                            RichText::new(format!("{} comments", story.descendants))
                                .color(self.theme.link_color)
                                .size(14.0),
                        )
                        .frame(false),
                    );
                    if comments_btn.clicked() {
                        open_comments = true;
                    }
                });
            });

        open_comments
    }

    fn render_story_view(&mut self, ui: &mut Ui) {
        let Some(tree) = self.controller.thread() else {
            return;
        };
        let story = tree.story.clone();
        let state = tree.state.clone();
        let loaded = tree.loaded_count();
        let now = chrono::Utc::now().timestamp();

        let mut go_back = false;
        let mut refresh = false;
        let mut actions = Vec::new();

        ui.horizontal(|ui| {
            go_back = ui.button("← Back to news list").clicked();
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                refresh = ui
                    .add_enabled(state != ThreadState::Loading, egui::Button::new("Refresh comments"))
                    .clicked();
                if state == ThreadState::Loading {
                    ui.spinner();
                }
            });
        });
        ui.add_space(8.0);

        let title = ui
            .add(
                egui::Label::new(
                    RichText::new(&story.title)
                        .color(self.theme.highlight)
                        .size(20.0)
                        .strong(),
                )
                .sense(egui::Sense::click()),
            )
            .on_hover_text(story.link());
        if title.clicked() {
            self.open_link(&story.link());
        }

        ui.horizontal(|ui| {
            ui.label(RichText::new(format!("by {}", story.by)).color(self.theme.accent));
            ui.label(RichText::new(format_timestamp(story.time)).color(self.theme.secondary_text));
            ui.label(
                RichText::new(format!("{} pts", story.score)).color(self.theme.score_color(story.score)),
            );
            ui.label(
                RichText::new(format!("{} comments, {} shown", story.descendants, loaded))
                    .color(self.theme.secondary_text),
            );
        });

        if !story.text.is_empty() {
            ui.add_space(6.0);
            ui.label(RichText::new(clean_html(&story.text)).color(self.theme.text));
        }
        ui.separator();

        if let ThreadState::Failed(message) = &state {
            ui.label(RichText::new(message).color(self.theme.error));
        }

        ScrollArea::vertical()
            .id_salt("comments_scroll")
            .auto_shrink([false; 2])
            .show(ui, |ui| {
                let Some(tree) = self.controller.thread() else {
                    return;
                };
                if tree.roots.is_empty() && state == ThreadState::Loaded {
                    ui.label(RichText::new("No comments yet").color(self.theme.secondary_text).italics());
                }
                for node in &tree.roots {
                    render_comment(ui, &self.theme, node, 0, now, &mut actions);
                }
            });

        for action in actions {
            match action {
                CommentAction::Toggle(id) => self.controller.toggle_comment(id),
                CommentAction::Retry(id) => self.controller.retry_comment(id),
            }
        }
        if refresh {
            self.controller.refresh_comments();
        }
        if go_back {
            self.controller.close_story();
        }
    }
}

fn render_comment(
    ui: &mut Ui,
    theme: &AppTheme,
    node: &CommentNode,
    depth: usize,
    now: i64,
    actions: &mut Vec<CommentAction>,
) {
    let comment = &node.comment;

    egui::Frame::new()
        .fill(theme.comment_background(depth))
        .corner_radius(CornerRadius::same(6))
        .stroke(Stroke::new(1.0, theme.separator))
        .inner_margin(10.0)
        .outer_margin(egui::vec2(8.0, 4.0))
        .show(ui, |ui| {
            ui.horizontal(|ui| {
                ui.add_space((depth * 16) as f32);

                ui.vertical(|ui| {
                    ui.horizontal(|ui| {
                        if node.has_replies() {
                            let label = if node.expanded { "[-]" } else { "[+]" };
                            let toggle = ui.add(
                                egui::Button::new(RichText::new(label).color(theme.text).monospace().size(16.0))
                                    .small()
                                    .frame(false)
                                    .fill(Color32::TRANSPARENT),
                            );
                            if toggle.hovered() {
                                ui.output_mut(|o| o.cursor_icon = egui::CursorIcon::PointingHand);
                            }
                            if toggle.clicked() {
                                actions.push(CommentAction::Toggle(comment.id));
                            }
                            ui.add_space(4.0);
                        }

                        ui.label(RichText::new(&comment.by).color(theme.accent).strong().size(14.0));
                        ui.add_space(8.0);
                        ui.label(
                            RichText::new(time_ago(comment.time, now))
                                .color(theme.secondary_text)
                                .size(14.0),
                        )
                        .on_hover_text(format_timestamp(comment.time));

                        if node.has_replies() && !node.expanded {
                            ui.add_space(8.0);
                            let count = comment.kids.len();
                            let noun = if count == 1 { "reply" } else { "replies" };
                            ui.label(
                                RichText::new(format!("{} {}", count, noun))
                                    .color(theme.secondary_text)
                                    .italics()
                                    .size(14.0),
                            );
                        }
                    });

                    ui.add_space(4.0);
                    ui.label(RichText::new(clean_html(&comment.text)).color(theme.text).size(15.0));

                    if !node.expanded {
                        return;
                    }
                    match &node.state {
                        ChildrenState::NotLoaded => {}
                        ChildrenState::Loading => {
                            ui.horizontal(|ui| {
                                ui.spinner();
                                ui.label(RichText::new("Loading replies...").color(theme.secondary_text));
                            });
                        }
                        ChildrenState::Failed(message) => {
                            ui.horizontal(|ui| {
                                ui.label(RichText::new(message).color(theme.error));
                                if ui.small_button("Retry").clicked() {
                                    actions.push(CommentAction::Retry(comment.id));
                                }
                            });
                        }
                        ChildrenState::Loaded => {
                            if node.children.is_empty() {
                                ui.label(
                                    RichText::new("All replies were deleted")
                                        .color(theme.secondary_text)
                                        .italics(),
                                );
                            }
                            ui.add_space(4.0);
                            for child in &node.children {
                                render_comment(ui, theme, child, depth + 1, now, actions);
                            }
                        }
                    }
                });
            });
        });
}

impl eframe::App for HackerNewsReaderApp {
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        storage.set_string(DARK_MODE_KEY, self.is_dark_mode.to_string());
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.theme.apply_to_ctx(ctx);

        // The view is live from the first frame on
        if !self.controller.is_mounted() {
            self.controller.mount();
        }

        self.controller.poll();
        self.process_keyboard_shortcuts(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            self.render_header(ui);
            self.render_error_banner(ui);
            ui.add_space(4.0);

            if self.controller.thread().is_some() {
                self.render_story_view(ui);
            } else {
                self.render_search_bar(ui);
                ui.add_space(4.0);
                self.render_stories_table(ui);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryStorage(HashMap<String, String>);

    impl eframe::Storage for MemoryStorage {
        fn get_string(&self, key: &str) -> Option<String> {
            self.0.get(key).cloned()
        }

        fn set_string(&mut self, key: &str, value: String) {
            self.0.insert(key.to_string(), value);
        }

        fn flush(&mut self) {}
    }

    #[test]
    fn theme_choice_round_trips_through_storage() {
        let mut storage = MemoryStorage::default();
        assert_eq!(stored_dark_mode(&storage), None);

        eframe::Storage::set_string(&mut storage, DARK_MODE_KEY, false.to_string());
        assert_eq!(stored_dark_mode(&storage), Some(false));

        eframe::Storage::set_string(&mut storage, DARK_MODE_KEY, "maybe".to_string());
        assert_eq!(stored_dark_mode(&storage), None);
    }
}
