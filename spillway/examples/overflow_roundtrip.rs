use serde::{Deserialize, Serialize};
use spillway::prelude::*;
use tempfile::TempDir;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;
use url::Url;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Journal {
    owner: Option<String>,
    entries: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info,spillway=trace")
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f %Z".into()))
        .init();

    let root = TempDir::new()?;
    let endpoint = Url::from_directory_path(root.path())
        .map_err(|_| anyhow::anyhow!("Failed to convert {:?} to Url", root.path()))?;

    let config = TierConfig::new("journals", "journal-overflow")
        .with_name("journal-storage")
        .with_endpoint(endpoint);

    info!("Initializing coordinator under {:?}...", root.path());
    let coordinator = TierCoordinator::local_fs(config)?;
    coordinator.start().await?;

    let entity = EntityRef::of::<Journal>("alice");

    let mut journal = Journal {
        owner: Some("alice".into()),
        entries: vec!["first entry".into()],
    };
    coordinator.write_state(&entity, &journal).await?;
    info!("Small journal stored in {:?} tier", coordinator.tier_of(&entity).await?);

    journal
        .entries
        .extend((0..20_000).map(|i| format!("entry number {i} with some padding")));
    coordinator.write_state(&entity, &journal).await?;
    info!("Large journal stored in {:?} tier", coordinator.tier_of(&entity).await?);

    let mut read = Journal::default();
    coordinator.read_state(&entity, &mut read).await?;
    info!(
        "Read back {} entries, identical: {}",
        read.entries.len(),
        read == journal
    );

    coordinator.clear_state(&entity).await?;
    info!("Cleared, tier is now {:?}", coordinator.tier_of(&entity).await?);

    coordinator.stop().await?;

    Ok(())
}
