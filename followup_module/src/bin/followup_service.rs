use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info};

use followup_module::directory::UserDirectory;
use followup_module::mailbox::ReplyMailbox;
use followup_module::notify::EmailNotifier;
use followup_module::service::driver::run_loop;
use followup_module::service::{BoxError, ServiceConfig};
use followup_module::{FollowupTracker, SqliteTaskStore};

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt().init();

    let config = ServiceConfig::from_env()?;
    info!(
        "starting followup service db={} team={} inbound={}",
        config.tasks_db_path.display(),
        config.team_config_path.display(),
        config.inbound_dir.display()
    );

    let directory = UserDirectory::load(&config.team_config_path).map_err(|err| {
        error!(
            "could not load team directory from {}: {}",
            config.team_config_path.display(),
            err
        );
        err
    })?;
    info!("team directory loaded with {} users", directory.users().len());

    let stop_flag = Arc::new(AtomicBool::new(false));
    let worker_stop = stop_flag.clone();
    let worker = tokio::task::spawn_blocking(move || -> Result<(), BoxError> {
        let store = SqliteTaskStore::new(config.tasks_db_path.clone())?;
        let notifier = EmailNotifier::new(directory.clone(), config.mail_from.clone());
        let tracker = FollowupTracker::new(store, notifier, directory, config.tracker.clone());
        let mailbox = ReplyMailbox::new(config.inbound_dir.clone());
        run_loop(&tracker, &mailbox, config.poll_interval, &worker_stop);
        Ok(())
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    stop_flag.store(true, Ordering::Relaxed);
    worker.await??;
    Ok(())
}
