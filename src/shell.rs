use std::sync::Arc;

use tracing::error;

use crate::state::SharedState;

const TITLE: &str = "Facial Expression Analysis";

/// Minimal desktop presence: one button that opens the status page in the
/// default browser, plus a close-confirmation dialog. Confirming the close
/// clears the running flag and tears down the event loop without waiting
/// for the capture loop to exit.
pub struct ShellApp {
    shared: Arc<SharedState>,
    interface_url: String,
    confirm_quit: bool,
    allowed_to_close: bool,
}

impl ShellApp {
    pub fn new(shared: Arc<SharedState>, interface_url: String) -> Self {
        Self {
            shared,
            interface_url,
            confirm_quit: false,
            allowed_to_close: false,
        }
    }
}

impl eframe::App for ShellApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(24.0);
                if ui.button("Open Interface").clicked() {
                    if let Err(error) = open::that(&self.interface_url) {
                        error!("failed to open browser: {error}");
                    }
                }
            });
        });

        if ctx.input(|i| i.viewport().close_requested()) && !self.allowed_to_close {
            ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
            self.confirm_quit = true;
        }

        if self.confirm_quit {
            egui::Window::new("Quit")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.label("Do you want to quit?");
                    ui.horizontal(|ui| {
                        if ui.button("Quit").clicked() {
                            self.shared.request_stop();
                            self.confirm_quit = false;
                            self.allowed_to_close = true;
                            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                        }
                        if ui.button("Cancel").clicked() {
                            self.confirm_quit = false;
                        }
                    });
                });
        }
    }
}

pub fn run(shared: Arc<SharedState>, interface_url: String) -> eframe::Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([320.0, 140.0])
            .with_title(TITLE),
        ..Default::default()
    };
    eframe::run_native(
        TITLE,
        options,
        Box::new(move |_cc| Ok(Box::new(ShellApp::new(shared, interface_url)))),
    )
}
