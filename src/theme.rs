use eframe::egui;
use egui::{Color32, CornerRadius, Stroke};

pub struct AppTheme {
    pub background: Color32,
    pub card_background: Color32,
    pub text: Color32,
    pub secondary_text: Color32,
    pub highlight: Color32,
    pub accent: Color32,
    pub separator: Color32,
    pub score_high: Color32,
    pub score_medium: Color32,
    pub score_low: Color32,
    pub link_color: Color32,
    pub error: Color32,
    pub error_background: Color32,
    pub button_background: Color32,
    pub button_foreground: Color32,
    pub button_active_background: Color32,
    pub button_hover_background: Color32,
    is_dark: bool,
}

impl AppTheme {
    pub fn for_mode(dark: bool) -> Self {
        if dark {
            Self::dark()
        } else {
            Self::light()
        }
    }

    pub fn dark() -> Self {
        Self {
            background: Color32::from_rgb(18, 18, 18),
            card_background: Color32::from_rgb(30, 30, 30),
            text: Color32::from_rgb(240, 240, 240),
            secondary_text: Color32::from_rgb(180, 180, 180),
            highlight: Color32::from_rgb(255, 102, 0), // HN orange
            accent: Color32::from_rgb(255, 153, 51),
            separator: Color32::from_rgb(60, 60, 60),
            score_high: Color32::from_rgb(76, 175, 80),
            score_medium: Color32::from_rgb(255, 193, 7),
            score_low: Color32::from_rgb(158, 158, 158),
            link_color: Color32::from_rgb(100, 181, 246),
            error: Color32::from_rgb(255, 138, 128),
            error_background: Color32::from_rgb(74, 30, 30),
            button_background: Color32::from_rgb(66, 66, 66),
            button_foreground: Color32::from_rgb(240, 240, 240),
            button_active_background: Color32::from_rgb(255, 102, 0),
            button_hover_background: Color32::from_rgb(80, 80, 80),
            is_dark: true,
        }
    }

    pub fn light() -> Self {
        Self {
            background: Color32::from_rgb(245, 245, 245),
            card_background: Color32::from_rgb(255, 255, 255),
            text: Color32::from_rgb(20, 20, 20),
            secondary_text: Color32::from_rgb(90, 90, 90),
            highlight: Color32::from_rgb(235, 92, 0),
            accent: Color32::from_rgb(220, 110, 20),
            separator: Color32::from_rgb(200, 200, 200),
            score_high: Color32::from_rgb(30, 110, 40),
            score_medium: Color32::from_rgb(190, 130, 0),
            score_low: Color32::from_rgb(80, 80, 80),
            link_color: Color32::from_rgb(20, 100, 200),
            error: Color32::from_rgb(183, 28, 28),
            error_background: Color32::from_rgb(255, 235, 238),
            button_background: Color32::from_rgb(235, 235, 235),
            button_foreground: Color32::from_rgb(20, 20, 20),
            button_active_background: Color32::from_rgb(235, 92, 0),
            button_hover_background: Color32::from_rgb(210, 210, 210),
            is_dark: false,
        }
    }

    pub fn apply_to_ctx(&self, ctx: &egui::Context) {
        let mut style = (*ctx.style()).clone();

        style.visuals.dark_mode = self.is_dark;
        style.visuals.panel_fill = self.background;
        style.visuals.window_fill = self.card_background;
        style.visuals.window_stroke = Stroke::new(1.0, self.separator);
        style.visuals.widgets.noninteractive.bg_fill = self.card_background;
        style.visuals.widgets.noninteractive.fg_stroke = Stroke::new(1.0, self.text);

        style.visuals.widgets.inactive.bg_fill = self.button_background;
        style.visuals.widgets.inactive.fg_stroke = Stroke::new(1.0, self.button_foreground);
        style.visuals.widgets.active.bg_fill = self.button_active_background;
        style.visuals.widgets.active.fg_stroke = Stroke::new(1.0, self.button_foreground);
        style.visuals.widgets.hovered.bg_fill = self.button_hover_background;
        style.visuals.widgets.hovered.fg_stroke = Stroke::new(1.0, self.button_foreground);

        style.visuals.selection.bg_fill = self.highlight;
        style.visuals.selection.stroke = Stroke::new(1.0, self.highlight);
        style.visuals.hyperlink_color = self.link_color;

        style.visuals.window_corner_radius = CornerRadius::same(8);
        style.visuals.widgets.noninteractive.corner_radius = CornerRadius::same(4);
        style.visuals.widgets.inactive.corner_radius = CornerRadius::same(4);
        style.visuals.widgets.hovered.corner_radius = CornerRadius::same(4);
        style.visuals.widgets.active.corner_radius = CornerRadius::same(4);

        ctx.set_style(style);
    }

    pub fn score_color(&self, score: i64) -> Color32 {
        if score >= 300 {
            self.score_high
        } else if score >= 100 {
            self.score_medium
        } else {
            self.score_low
        }
    }

    // Border for story cards, stronger for popular stories
    pub fn card_stroke(&self, score: i64) -> Stroke {
        if score >= 300 {
            Stroke::new(1.5, self.score_high)
        } else if score >= 100 {
            Stroke::new(1.2, self.score_medium)
        } else {
            Stroke::new(1.0, self.separator)
        }
    }

    // Alternate card shades so nesting stays readable
    pub fn comment_background(&self, depth: usize) -> Color32 {
        if depth % 2 == 0 {
            return self.card_background;
        }

        let bg = self.card_background;
        if self.is_dark {
            Color32::from_rgb(bg.r().saturating_add(10), bg.g().saturating_add(10), bg.b().saturating_add(10))
        } else {
            Color32::from_rgb(bg.r().saturating_sub(10), bg.g().saturating_sub(10), bg.b().saturating_sub(10))
        }
    }
}
