use std::{fs, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use comfy_table::Table;
use human_repr::HumanDuration;
use tracing::info;
use wordbreak_core::{
    DispatchStrategy, HashFunctionRegistry, HashOptions, SearchOptions, SearchRequest,
    SearchScheduler, WordlistSource, WordlistStore,
};

use crate::Crack;

pub async fn crack(args: Crack) -> Result<()> {
    let text = fs::read_to_string(&args.wordlist)
        .with_context(|| format!("Unable to read the wordlist at {}", args.wordlist.display()))?;
    let name = args
        .wordlist
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "wordlist".to_owned());

    let wordlists = Arc::new(WordlistStore::new());
    let entry = wordlists.load(&name, &text);
    info!(wordlist = name.as_str(), words = entry.count(), "wordlist loaded");

    let rules = args
        .rules
        .as_ref()
        .map(|path| {
            fs::read_to_string(path)
                .with_context(|| format!("Unable to read the rule file at {}", path.display()))
        })
        .transpose()?;

    let dispatch = Arc::new(DispatchStrategy::detect());
    if let Some(device) = &dispatch.capability().device_info {
        info!(device = device.as_str(), "GPU adapter found");
    }

    let scheduler = SearchScheduler::new(
        wordlists,
        Arc::new(HashFunctionRegistry::with_builtins()),
        dispatch,
    );

    let request = SearchRequest {
        target: args.digest,
        hash_type: args.hash_type,
        wordlist: WordlistSource::Named(name),
        rules,
        options: SearchOptions {
            max_time: Duration::from_secs(args.max_time),
            batch_size: args.batch_size,
            hash_options: HashOptions {
                salt: args.salt,
                iterations: args.iterations,
                username: args.username,
                domain: args.domain,
            },
        },
    };

    let handle = scheduler.start(request)?;

    // poll-based progress reporting while the search runs
    let controller = scheduler.controller();
    let progress = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(500));
        interval.tick().await;

        loop {
            interval.tick().await;

            let status = controller.status();
            if !status.running {
                break;
            }

            info!(
                tested = status.tested,
                total = status.total,
                progress = format!("{:.1}%", status.progress),
                "searching"
            );
        }
    });

    let outcome = handle.join().await;
    progress.abort();

    let mut table = Table::new();
    table
        .set_header(vec!["Result", "Password", "Tested", "Time", "Backend"])
        .add_row(vec![
            outcome.state.to_string(),
            outcome.password.clone().unwrap_or_else(|| "-".to_owned()),
            outcome.tested.to_string(),
            outcome.elapsed.as_secs_f64().human_duration().to_string(),
            outcome.backend.to_string(),
        ]);
    println!("{table}");

    if let Some(password) = outcome.password {
        println!("{password}");
    } else {
        eprintln!("No password found for the given digest");
    }

    Ok(())
}
