use crate::ui::progress_message::ProgressMessage;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::thread;

/// Renders fixture seeding progress, one bar per entity.
///
/// The engine's progress callback runs inside the async task stream, so
/// messages cross a channel to a dedicated render thread; a bar appears
/// the first time an entity reports and finishes when it reaches 100%.
pub struct SeedProgress {
    mp: MultiProgress,
    _handle: thread::JoinHandle<()>,
}

impl SeedProgress {
    pub fn new() -> (Self, crossbeam::channel::Sender<ProgressMessage>) {
        let (tx, rx) = crossbeam::channel::unbounded::<ProgressMessage>();

        let mp = MultiProgress::new();
        let mp_clone = mp.clone();

        let handle = thread::spawn(move || {
            let mut bars: HashMap<String, ProgressBar> = HashMap::new();

            for msg in rx {
                match msg {
                    ProgressMessage::Percent { entity, percent } => {
                        let bar = bars.entry(entity.clone()).or_insert_with(|| {
                            if !console::Term::stdout().is_term() {
                                return ProgressBar::hidden();
                            }
                            let bar = mp_clone.add(ProgressBar::new(100));
                            bar.set_style(
                                ProgressStyle::with_template(
                                    "{msg:>12} [{bar:30}] {pos:>3}%",
                                )
                                .unwrap_or_else(|_| ProgressStyle::default_bar()),
                            );
                            bar.set_message(entity.clone());
                            bar
                        });
                        bar.set_position(u64::from(percent));
                        if percent >= 100 {
                            bar.finish();
                        }
                    }
                    ProgressMessage::Exit => break,
                }
            }
        });

        (Self { mp, _handle: handle }, tx)
    }

    pub fn clear(&self) {
        self.mp.clear().ok();
    }
}
