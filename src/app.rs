use crate::client::SlskdClient;
use crate::engine::SearchEngine;
use crate::filter::Category;
use crate::flatten::FlatRow;
use crate::snapshot::RowKey;
use crate::view::{ListModel, ListView, ResultsView};
use eframe::egui;
use std::ops::Range;
use std::time::{Duration, Instant};

/// egui side of the presentation boundary.
#[derive(Default)]
struct GuiView {
    list: ListModel,
    status_line: String,
    alert_pending: bool,
}

impl ListView for GuiView {
    fn render(&mut self, rows: &[FlatRow]) {
        self.list.render(rows);
    }

    fn selection(&self) -> Vec<RowKey> {
        self.list.selection()
    }

    fn set_selection(&mut self, keys: &[RowKey]) {
        self.list.set_selection(keys);
    }

    fn focus(&self) -> Option<RowKey> {
        self.list.focus()
    }

    fn set_focus(&mut self, key: &RowKey) {
        self.list.set_focus(key);
    }

    fn top_visible(&self) -> Option<RowKey> {
        self.list.top_visible()
    }

    fn ensure_visible(&mut self, key: &RowKey) {
        self.list.ensure_visible(key);
    }
}

impl ResultsView for GuiView {
    fn on_rows_changed(&mut self, _rows: &[FlatRow], _repainted: bool) {}

    fn on_status(&mut self, message: &str) {
        self.status_line = message.to_string();
    }

    fn on_enqueue_result(&mut self, _succeeded: usize, _total: usize) {}

    fn alert(&mut self) {
        self.alert_pending = true;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowAction {
    EnqueueSelected,
    EnqueueDirectory,
    EnqueueAllFromUser,
}

pub struct SearchApp {
    engine: SearchEngine<SlskdClient>,
    view: GuiView,
    query: String,
    category: Category,
    auto_update: bool,
    interval_secs: u64,
    visible_rows: Range<usize>,
    focus_query_requested: bool,
    focus_row_requested: bool,
}

impl SearchApp {
    pub fn new(engine: SearchEngine<SlskdClient>, query: String, category: Category) -> Self {
        let auto_update = engine.poller().auto_update();
        let interval_secs = engine.poller().interval().as_secs();
        let mut app = Self {
            engine,
            view: GuiView::default(),
            query,
            category: Category::All,
            auto_update,
            interval_secs,
            visible_rows: 0..0,
            focus_query_requested: true,
            focus_row_requested: false,
        };
        app.set_category(category);
        if !app.query.trim().is_empty() {
            app.submit_search();
        }
        app
    }

    fn submit_search(&mut self) {
        let _ = self.engine.submit_search(&self.query, &mut self.view);
    }

    fn set_category(&mut self, category: Category) {
        self.category = category;
        self.engine.set_category(category, &mut self.view);
    }

    fn apply_row_action(&mut self, action: RowAction) {
        match action {
            RowAction::EnqueueSelected => self.engine.enqueue_selected(&mut self.view),
            RowAction::EnqueueDirectory => {
                self.engine.enqueue_containing_directory(&mut self.view)
            }
            RowAction::EnqueueAllFromUser => self.engine.enqueue_all_from_user(&mut self.view),
        }
    }

    fn move_row(&mut self, delta: isize) {
        self.view.list.move_focus(delta);
        self.focus_row_requested = true;
    }

    fn handle_shortcuts(&mut self, ctx: &egui::Context, query_has_focus: bool) {
        if ctx.input(|i| i.key_pressed(egui::Key::F5)) {
            self.engine.refresh_now(&mut self.view);
        }
        let ctrl_mod = egui::Modifiers::CTRL;
        if ctx.input_mut(|i| i.consume_key(ctrl_mod, egui::Key::L)) {
            self.focus_query_requested = true;
        }
        if query_has_focus {
            return;
        }
        if ctx.input(|i| i.key_pressed(egui::Key::ArrowDown)) {
            self.move_row(1);
        }
        if ctx.input(|i| i.key_pressed(egui::Key::ArrowUp)) {
            self.move_row(-1);
        }
        if ctx.input_mut(|i| i.consume_key(egui::Modifiers::NONE, egui::Key::Space)) {
            if let Some(index) = self.view.list.focused_index() {
                self.view.list.toggle(index);
            }
        }
        if ctx.input_mut(|i| i.consume_key(egui::Modifiers::NONE, egui::Key::Enter)) {
            self.apply_row_action(RowAction::EnqueueSelected);
        }
        if ctx.input_mut(|i| i.consume_key(ctrl_mod, egui::Key::D)) {
            self.apply_row_action(RowAction::EnqueueDirectory);
        }
        if ctx.input_mut(|i| i.consume_key(ctrl_mod, egui::Key::U)) {
            self.apply_row_action(RowAction::EnqueueAllFromUser);
        }
    }

    fn repaint_delay(&self) -> Option<Duration> {
        if self.engine.is_busy() {
            return Some(Duration::from_millis(16));
        }
        self.engine
            .poller()
            .until_next(Instant::now())
            .map(|d| d.min(Duration::from_millis(250)))
    }

    fn results_list(&mut self, ui: &mut egui::Ui) -> Option<RowAction> {
        let mut action = None;
        let row_height = ui.text_style_height(&egui::TextStyle::Body);
        let stride = row_height + ui.spacing().item_spacing.y;
        let mut area = egui::ScrollArea::vertical()
            .id_salt("results")
            .auto_shrink([false, false]);
        // Jump only when the requested row is off screen.
        if let Some(index) = self.view.list.take_scroll_request() {
            if !self.visible_rows.contains(&index) {
                area = area.vertical_scroll_offset(index as f32 * stride);
            }
        }

        let total = self.view.list.len();
        let mut clicked: Option<(usize, bool)> = None;
        area.show_rows(ui, row_height, total, |ui, range| {
            self.view.list.set_top(range.start);
            self.visible_rows = range.clone();
            for index in range {
                let Some(row) = self.view.list.rows().get(index) else {
                    continue;
                };
                let text = row.display_text();
                let selected = self.view.list.is_selected(index);
                let response = ui.selectable_label(selected, text);
                if self.focus_row_requested && self.view.list.focused_index() == Some(index) {
                    response.request_focus();
                    self.focus_row_requested = false;
                }
                if response.clicked() {
                    clicked = Some((index, ui.input(|i| i.modifiers.ctrl)));
                }
                if response.double_clicked() {
                    action = Some(RowAction::EnqueueSelected);
                }
                response.context_menu(|ui| {
                    if ui.button("Download File(s)").clicked() {
                        action = Some(RowAction::EnqueueSelected);
                        ui.close_menu();
                    }
                    if ui.button("Download Containing Directory").clicked() {
                        action = Some(RowAction::EnqueueDirectory);
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Enqueue All From Same User").clicked() {
                        action = Some(RowAction::EnqueueAllFromUser);
                        ui.close_menu();
                    }
                });
            }
        });
        if let Some((index, toggle)) = clicked {
            if toggle {
                self.view.list.toggle(index);
            } else {
                self.view.list.click(index);
            }
        }
        action
    }
}

impl eframe::App for SearchApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.engine.tick(Instant::now(), &mut self.view);
        if std::mem::take(&mut self.view.alert_pending) {
            ctx.send_viewport_cmd(egui::ViewportCommand::RequestUserAttention(
                egui::UserAttentionType::Informational,
            ));
        }

        let mut query_has_focus = false;
        egui::TopBottomPanel::top("query").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label("Query (Q):");
                let query_id = ui.make_persistent_id("query-input");
                let output = egui::TextEdit::singleline(&mut self.query)
                    .id(query_id)
                    .desired_width(360.0)
                    .hint_text("Search the network...")
                    .show(ui);
                if self.focus_query_requested {
                    output.response.request_focus();
                    self.focus_query_requested = false;
                }
                query_has_focus = output.response.has_focus();
                let submitted =
                    output.response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

                let mut category = self.category;
                egui::ComboBox::from_label("Type (T)")
                    .selected_text(category.label())
                    .show_ui(ui, |ui| {
                        for c in Category::ALL {
                            ui.selectable_value(&mut category, c, c.label());
                        }
                    });
                if category != self.category {
                    self.set_category(category);
                }

                if ui.button("Search").clicked() || submitted {
                    self.submit_search();
                }
                if ui.button("Refresh Results").clicked() {
                    self.engine.refresh_now(&mut self.view);
                }
                if ui.button("Stop").clicked() {
                    self.engine.stop_search(&mut self.view);
                }
            });
            ui.horizontal(|ui| {
                if ui.checkbox(&mut self.auto_update, "Auto update").changed() {
                    self.engine.set_auto_update(self.auto_update);
                }
                let slider = egui::Slider::new(&mut self.interval_secs, 1..=60).text("Interval (s)");
                if ui.add(slider).changed() {
                    self.engine.set_interval(self.interval_secs);
                }
            });
        });

        egui::TopBottomPanel::bottom("status")
            .resizable(false)
            .exact_height(24.0)
            .show(ctx, |ui| {
                ui.add(egui::Label::new(&self.view.status_line).truncate());
            });

        let mut action = None;
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Enqueue Selected File(s)").clicked() {
                    action = Some(RowAction::EnqueueSelected);
                }
                if ui.button("Enqueue All From Same User").clicked() {
                    action = Some(RowAction::EnqueueAllFromUser);
                }
            });
            ui.separator();
            if let Some(row_action) = self.results_list(ui) {
                action = Some(row_action);
            }
        });

        self.handle_shortcuts(ctx, query_has_focus);
        if let Some(action) = action {
            self.apply_row_action(action);
        }
        if let Some(delay) = self.repaint_delay() {
            ctx.request_repaint_after(delay);
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if let Some(handle) = self.engine.close() {
            let _ = handle.join();
        }
    }
}
