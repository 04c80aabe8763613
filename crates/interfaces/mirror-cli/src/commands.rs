//! `add`/`update` command bodies (spec §6 CLI). Kept out of `main.rs` so
//! the argument parsing and the actual work stay separable, the same split
//! the teacher's `fleet-cli` uses between `main.rs` and `commands.rs`.

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use dialoguer::Input;
use mirror_config::{Config, MirrorCache};
use mirror_core::ProbeMode;
use mirror_publish::{Publisher, PRIMARY_UPSTREAM_ID};
use mirror_sync::{parse_selection, resolve_indices, urlutil, EngineError, PublishRequest, Selection, SyncEngine};

use crate::logging::MirrorLog;

/// Interactive `add` (spec §6): prompts for a URL, probes it, lists
/// patches if it's a repo, accepts a selection, then offers to mark any of
/// the newly-added patches one-time.
pub async fn cmd_add(script_dir: Utf8PathBuf) -> Result<()> {
    let config = Config::load(&script_dir).context("loading config.json")?;
    let engine = SyncEngine::new(
        config.mirror_dir.clone(),
        reqwest::Client::new(),
        Box::new(Publisher::with_default_builder()),
    );

    // Recovery runs to completion before any new input is accepted
    // (spec §4.7).
    let recovered = engine
        .recover(&|repo_id| config.mirror_repo_url(repo_id))
        .await
        .context("recovering an interrupted session")?;
    if recovered.add_recovered || recovered.update_recovered {
        MirrorLog::Success.emit("resumed an interrupted session left over from a previous run");
    }

    let url: String = Input::new().with_prompt("Repo or patch URL").interact_text()?;
    let mode = engine.probe(&url).await.context("probing URL")?;

    let (repo_url, patch_ids) = match mode {
        ProbeMode::AddRepo => {
            let descriptor = engine.manifest().fetch_repo(&url, mode).await?;
            let patches: Vec<(String, String)> = descriptor.patches.into_iter().collect();
            for (i, (id, desc)) in patches.iter().enumerate() {
                println!("{:>3}) {id} - {desc}", i + 1);
            }
            let input: String = Input::new()
                .with_prompt("Select patches (indices, blank = all, c = cancel)")
                .allow_empty(true)
                .interact_text()?;
            match parse_selection(&input) {
                Selection::Cancel => {
                    MirrorLog::Info.emit("cancelled");
                    return Ok(());
                }
                Selection::All => (url.clone(), patches.into_iter().map(|(id, _)| id).collect()),
                Selection::Indices(indices) => {
                    let (valid, invalid) = resolve_indices(&indices, patches.len());
                    warn_invalid_indices(&invalid);
                    (url.clone(), valid.into_iter().map(|i| patches[i].0.clone()).collect())
                }
            }
        }
        ProbeMode::AddPatch => {
            let patch_id = urlutil::last_path_segment(&url)?;
            (urlutil::parent(&url)?, vec![patch_id])
        }
    };

    if patch_ids.is_empty() {
        MirrorLog::Warning.emit("nothing selected, nothing to do");
        return Ok(());
    }

    let upstream_repo = engine.manifest().fetch_repo(&repo_url, ProbeMode::AddRepo).await?;
    // The special upstream id is remapped to a local folder name from
    // config; every other repo keeps its own id (spec §4.4 tie-breaks).
    let local_repo_id = if upstream_repo.id == PRIMARY_UPSTREAM_ID {
        config.thpatch.clone()
    } else {
        upstream_repo.id.clone()
    };
    let mirror_repo_url = config.mirror_repo_url(&local_repo_id);
    let request = PublishRequest {
        local_repo_id: local_repo_id.clone(),
        mirror_dir: Utf8PathBuf::from(config.mirror_dir.clone()),
        upstream_repo,
        mirror_repo_url,
        primary_local_id: config.thpatch.clone(),
    };

    MirrorLog::Get.emit(&format!("adding {} patch(es) to {local_repo_id}", patch_ids.len()));
    let outcome = engine
        .add_patches(&local_repo_id, &repo_url, patch_ids, &request)
        .await?;

    for patch in &outcome.added {
        MirrorLog::Success.emit(&format!("{local_repo_id}/{patch} added"));
    }
    for (patch, reason) in &outcome.skipped {
        MirrorLog::Error.emit(&format!("{local_repo_id}/{patch} skipped: {reason}"));
    }

    if !outcome.added.is_empty() {
        prompt_one_time(&engine, &local_repo_id, &outcome.added).await?;
    }

    Ok(())
}

/// Which of the patches just added should be dropped from the version
/// store immediately so the `update` command stops polling them (spec §6,
/// §8 scenario 6).
async fn prompt_one_time(engine: &SyncEngine, repo_id: &str, added: &[String]) -> Result<()> {
    for (i, patch) in added.iter().enumerate() {
        println!("{:>3}) {patch}", i + 1);
    }
    let input: String = Input::new()
        .with_prompt("Which of these are one-time? (blank = all, c = none)")
        .allow_empty(true)
        .interact_text()?;

    let indices = match parse_selection(&input) {
        Selection::Cancel => Vec::new(),
        Selection::All => (1..=added.len()).collect(),
        Selection::Indices(indices) => indices,
    };
    let (valid, invalid) = resolve_indices(&indices, added.len());
    warn_invalid_indices(&invalid);

    for i in valid {
        let patch = &added[i];
        engine.version_store().remove(repo_id, patch).await?;
        MirrorLog::Remove.emit(&format!("{repo_id}/{patch} is one-time, removed from the version store"));
    }
    Ok(())
}

fn warn_invalid_indices(invalid: &[usize]) {
    for i in invalid {
        MirrorLog::Warning.emit(&format!("skipping out-of-range selection {i}"));
    }
}

/// Non-interactive `update` (spec §6): polls every mirrored repo and
/// converges whatever has drifted from upstream.
pub async fn cmd_update(mirror_arg: Utf8PathBuf, script_dir: Utf8PathBuf) -> Result<()> {
    let config = Config::load(&script_dir).context("loading config.json")?;
    let mirror_dir = MirrorCache::resolve(&script_dir, mirror_arg.as_str())
        .context("resolving mirror directory")?;

    let engine = SyncEngine::new(
        mirror_dir,
        reqwest::Client::new(),
        Box::new(Publisher::with_default_builder()),
    );

    let recovered = engine
        .recover(&|repo_id| config.mirror_repo_url(repo_id))
        .await
        .context("recovering an interrupted session")?;
    if recovered.add_recovered || recovered.update_recovered {
        MirrorLog::Success.emit("resumed an interrupted session before polling for updates");
    }

    let outcome = match engine.run_update().await {
        Ok(outcome) => outcome,
        Err(EngineError::NoVersionStore(_)) => {
            MirrorLog::Info.emit("nothing is mirrored yet, nothing to update");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    for (repo_id, patch) in &outcome.converged {
        MirrorLog::Update.emit(&format!("{repo_id}/{patch} converged to upstream"));
    }
    for (repo_id, patch, reason) in &outcome.unreachable {
        MirrorLog::Error.emit(&format!("{repo_id}/{patch} could not be checked: {reason}"));
    }
    MirrorLog::Success.emit(&format!(
        "update finished: {} converged, {} unchanged, {} unreachable",
        outcome.converged.len(),
        outcome.unchanged.len(),
        outcome.unreachable.len(),
    ));

    Ok(())
}
