// SPDX-License-Identifier: Apache-2.0
//! End-to-end tour on the loopback transport: register a metric, look up
//! a project, and count the lines of every file in a checkout.
#![allow(clippy::print_stdout)]

use alitheia_client::logger::channel;
use alitheia_client::testing::{InMemoryScheduler, LoopbackOrb, RecordingLogger, StaticDatabase, StaticFds};
use alitheia_client::{Core, Database, Fds, Logger, Metric, MetricHandle};
use alitheia_proto::{ProjectVersion, PropertyMap, StoredProject, Variant};
use std::io::BufRead;
use std::sync::Arc;
use std::thread;

struct LineCount;

impl Metric for LineCount {
    fn author(&self) -> String {
        "example@alitheia".to_owned()
    }

    fn description(&self) -> String {
        "Counts the lines of a project file".to_owned()
    }

    fn name(&self) -> String {
        "Example".to_owned()
    }

    fn version(&self) -> String {
        "1.0.0".to_owned()
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let orb = LoopbackOrb::new();
    let scheduler = InMemoryScheduler::install(&orb);
    orb.install("Database", Arc::new(StaticDatabase::with_project("svn")));
    orb.install("Logger", Arc::new(RecordingLogger::new()));
    let files = Arc::new(StaticFds::new());
    files.add_file("README", "alpha\nbeta\ngamma\n");
    files.add_file("INSTALL", "one line\n");
    orb.install("FDS", Arc::clone(&files) as _);

    let core = Core::connect(Arc::new(orb.clone()))?;
    let runner = {
        let core = core.clone();
        thread::spawn(move || core.run())
    };

    let logger = Logger::connect(&orb, channel::METRIC)?;
    logger.info("line-count example starting");

    let metric = MetricHandle::new(Arc::new(LineCount));
    let id = core.register_metric(&metric)?;
    println!(
        "registered metric {} as {} (id {id})",
        LineCount.name(),
        metric.registration_name().unwrap_or_default(),
    );

    let db = Database::connect(&orb)?;
    let filter: PropertyMap = [("name", Variant::from("svn"))].into_iter().collect();
    let projects: Vec<StoredProject> = db.find_objects_by_properties(&filter)?;
    let project = projects
        .first()
        .ok_or_else(|| anyhow::anyhow!("no project named svn"))?;
    println!("found project {} (id {})", project.name, project.id);

    let fds = Fds::connect(&orb)?;
    let checkout = fds.get_checkout(&ProjectVersion::default())?;
    for file in checkout.files() {
        let mut lines = 0usize;
        let mut stream = checkout.file_contents(file);
        let mut line = String::new();
        while stream.read_line(&mut line)? > 0 {
            lines += 1;
            line.clear();
        }
        println!("{}: {lines} lines", file.name);
    }

    logger.info("line-count example done");
    println!("scheduler saw {} registrations", scheduler.registrations().len());
    core.shutdown();
    runner
        .join()
        .map_err(|_| anyhow::anyhow!("dispatch thread panicked"))?;
    Ok(())
}
