use eframe::egui;
use egui_plot::{Line, Plot, PlotPoints, VLine};

use rocket_flight::sim::{self, FlightDataBranch, FlightDataType, SimulationOptions, SimulationResult};
use rocket_flight::vehicle::presets;

fn main() -> anyhow::Result<()> {
    let preset = std::env::args().nth(1).unwrap_or_else(|| "alpha".to_string());
    let configuration = presets::by_name(&preset)?;
    let rocket = configuration.rocket().name().to_string();
    let conditions = SimulationOptions::default().to_conditions(configuration)?;
    let result = sim::simulate(conditions);

    let app = FlightViz { rocket, result };
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1200.0, 800.0]),
        ..Default::default()
    };
    eframe::run_native("Rocket Flight Simulator", options, Box::new(|_| Ok(Box::new(app))))
        .map_err(|e| anyhow::anyhow!("{e}"))
}

struct FlightViz {
    rocket: String,
    result: SimulationResult,
}

/// `(time, value)` pairs of one channel, skipping unrecorded samples.
fn series(branch: &FlightDataBranch, kind: FlightDataType) -> Vec<[f64; 2]> {
    let (Some(t), Some(v)) = (branch.get(FlightDataType::Time), branch.get(kind)) else {
        return Vec::new();
    };
    t.iter()
        .zip(v)
        .filter(|(_, v)| v.is_finite())
        .map(|(&t, &v)| [t, v])
        .collect()
}

fn channel_plot(ui: &mut egui::Ui, id: &str, kind: FlightDataType, result: &SimulationResult, w: f32, h: f32) {
    ui.vertical(|ui| {
        ui.label(kind.to_string());
        Plot::new(id)
            .width(w)
            .height(h)
            .x_axis_label("Time (s)")
            .show(ui, |plot_ui| {
                for branch in &result.branches {
                    plot_ui.line(Line::new(branch.name().to_string(), PlotPoints::from(series(branch, kind))));
                }
                if let Some(main) = result.main_branch() {
                    for e in main.events().iter().filter(|e| e.kind.is_logged()) {
                        plot_ui.vline(VLine::new(e.kind.to_string(), e.time));
                    }
                }
            });
    });
}

impl eframe::App for FlightViz {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.heading(format!("Rocket: {}", self.rocket));
            if let Some(main) = self.result.main_branch() {
                let s = main.summary();
                ui.label(format!(
                    "Apogee: {:.1} m  |  Max speed: Mach {:.2}  |  Branches: {}  |  Flight: {:.1} s",
                    s.max_altitude,
                    s.max_mach,
                    self.result.branches.len(),
                    s.flight_time,
                ));
            }
            if let Some(e) = self.result.outcome.error() {
                ui.colored_label(egui::Color32::RED, e.to_string());
            }
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let available = ui.available_size();
            let third_w = available.x / 3.0 - 8.0;
            let half_w = available.x / 2.0 - 8.0;
            let half_h = available.y / 2.0 - 24.0;
            let r = &self.result;

            ui.horizontal(|ui| {
                channel_plot(ui, "altitude", FlightDataType::Altitude, r, third_w, half_h);
                channel_plot(ui, "velocity", FlightDataType::VelocityTotal, r, third_w, half_h);
                channel_plot(ui, "acceleration", FlightDataType::AccelerationTotal, r, third_w, half_h);
            });

            ui.horizontal(|ui| {
                channel_plot(ui, "mach", FlightDataType::Mach, r, half_w, half_h);
                channel_plot(ui, "stability", FlightDataType::Stability, r, half_w, half_h);
            });
        });
    }
}
