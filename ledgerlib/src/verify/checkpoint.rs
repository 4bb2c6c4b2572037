// Copyright (C) 2013-2020 Blockstack PBC, a public benefit corporation
// Copyright (C) 2020-2024 Stacks Open Internet Foundation
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Progress checkpoints.
//!
//! Every resumable pass periodically records the last height it fully checked together
//! with its running counts.  A resumed run starts each pass strictly after that height and
//! carries the counts forward, so nothing already checked is flagged twice.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ledger_common::util::{
    deserialize_json_from_file, get_epoch_time_secs, serialize_json_to_file,
};

use crate::verify::{CancelToken, Error};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassCheckpoint {
    /// last height whose records were all checked
    pub height: Option<i64>,
    pub checked: u64,
    pub invalid: u64,
    pub complete: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointFile {
    pub ledger_path: String,
    pub transaction_count: i64,
    pub updated_at: u64,
    pub passes: BTreeMap<String, PassCheckpoint>,
}

/// Checkpoint state shared by all stages of a run, optionally mirrored to a JSON file
#[derive(Debug)]
pub struct CheckpointStore {
    path: Option<PathBuf>,
    state: Mutex<CheckpointFile>,
}

impl CheckpointStore {
    pub fn in_memory() -> CheckpointStore {
        CheckpointStore {
            path: None,
            state: Mutex::new(CheckpointFile::default()),
        }
    }

    /// Open the checkpoint file at `path`.  When resuming, the file must exist and belong
    /// to the same store; otherwise any existing file is replaced on the first save.
    pub fn open<P: AsRef<Path>, L: AsRef<Path>>(
        path: P,
        ledger_path: L,
        transaction_count: i64,
        resume: bool,
    ) -> Result<CheckpointStore, Error> {
        let path = path.as_ref().to_path_buf();
        let ledger_path = ledger_path.as_ref().display().to_string();
        let state = if resume {
            let loaded: CheckpointFile = deserialize_json_from_file(&path).map_err(|e| {
                Error::CheckpointError(format!("failed to load {}: {}", path.display(), e))
            })?;
            if loaded.ledger_path != ledger_path || loaded.transaction_count != transaction_count
            {
                return Err(Error::CheckpointError(format!(
                    "{} was written for {} ({} transactions), not {} ({} transactions)",
                    path.display(),
                    loaded.ledger_path,
                    loaded.transaction_count,
                    ledger_path,
                    transaction_count
                )));
            }
            info!("Loaded checkpoints";
                  "path" => %path.display(),
                  "passes" => loaded.passes.len(),
                  "updated_at" => loaded.updated_at);
            loaded
        } else {
            CheckpointFile {
                ledger_path,
                transaction_count,
                updated_at: 0,
                passes: BTreeMap::new(),
            }
        };
        Ok(CheckpointStore {
            path: Some(path),
            state: Mutex::new(state),
        })
    }

    pub fn get(&self, pass: &str) -> Result<Option<PassCheckpoint>, Error> {
        let state = self
            .state
            .lock()
            .map_err(|_| Error::CheckpointError("checkpoint state poisoned".into()))?;
        Ok(state.passes.get(pass).cloned())
    }

    pub fn save(&self, pass: &str, checkpoint: &PassCheckpoint) -> Result<(), Error> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::CheckpointError("checkpoint state poisoned".into()))?;
        state.passes.insert(pass.to_string(), checkpoint.clone());
        state.updated_at = get_epoch_time_secs();
        let path = match self.path {
            Some(ref path) => path,
            None => return Ok(()),
        };
        // write-then-rename so a crash never leaves a truncated file behind
        let tmp = path.with_extension("tmp");
        serialize_json_to_file(&*state, &tmp)
            .and_then(|_| fs::rename(&tmp, path))
            .map_err(|e| {
                Error::CheckpointError(format!("failed to write {}: {}", path.display(), e))
            })
    }
}

/// What every stage needs besides the store
#[derive(Debug, Clone)]
pub struct StageContext {
    pub cancel: CancelToken,
    pub checkpoints: Arc<CheckpointStore>,
    pub progress_interval: i64,
    pub resume: bool,
}

impl StageContext {
    pub fn new(cancel: CancelToken) -> StageContext {
        StageContext {
            cancel,
            checkpoints: Arc::new(CheckpointStore::in_memory()),
            progress_interval: crate::core::PROGRESS_INTERVAL,
            resume: false,
        }
    }
}

/// Progress of one height-ordered pass
pub struct PassProgress<'a> {
    pass: &'static str,
    ctx: &'a StageContext,
    state: PassCheckpoint,
    resumed: Option<PassCheckpoint>,
    next_report: Option<i64>,
}

impl<'a> PassProgress<'a> {
    pub fn start(pass: &'static str, ctx: &'a StageContext) -> Result<PassProgress<'a>, Error> {
        let resumed = if ctx.resume {
            ctx.checkpoints.get(pass)?
        } else {
            None
        };
        if let Some(ref cp) = resumed {
            info!("Resuming pass";
                  "pass" => pass,
                  "after_height" => cp.height.unwrap_or(0),
                  "checked" => cp.checked,
                  "invalid" => cp.invalid,
                  "complete" => cp.complete);
        }
        Ok(PassProgress {
            pass,
            ctx,
            state: resumed.clone().unwrap_or_default(),
            resumed,
            next_report: None,
        })
    }

    /// An earlier run already finished this pass
    pub fn is_complete(&self) -> bool {
        self.state.complete
    }

    /// Heights up to and including this one need no checking
    pub fn resume_after(&self) -> Option<i64> {
        self.resumed.as_ref().and_then(|cp| cp.height)
    }

    /// `(checked, invalid)` carried over from the run being resumed
    pub fn carried(&self) -> (u64, u64) {
        match self.resumed {
            Some(ref cp) => (cp.checked, cp.invalid),
            None => (0, 0),
        }
    }

    pub fn last_height(&self) -> Option<i64> {
        self.state.height
    }

    /// Called before each block; persists the checkpoint and fails if the run was cancelled
    pub fn check_cancel(&self) -> Result<(), Error> {
        if !self.ctx.cancel.is_cancelled() {
            return Ok(());
        }
        self.ctx.checkpoints.save(self.pass, &self.state)?;
        warn!("Pass cancelled";
              "pass" => self.pass,
              "last_checkpoint" => self.state.height.unwrap_or(0));
        Err(Error::Cancelled {
            stage: self.pass.to_string(),
            last_checkpoint: self.state.height,
        })
    }

    /// Record that every record at `height` was checked
    pub fn done(&mut self, height: i64, checked: u64, invalid: u64) -> Result<(), Error> {
        self.state.height = Some(height);
        self.state.checked += checked;
        self.state.invalid += invalid;

        let interval = self.ctx.progress_interval;
        let next = *self
            .next_report
            .get_or_insert_with(|| (height / interval + 1) * interval);
        if height >= next {
            info!("Verification progress";
                  "pass" => self.pass,
                  "height" => height,
                  "checked" => self.state.checked,
                  "invalid" => self.state.invalid);
            self.ctx.checkpoints.save(self.pass, &self.state)?;
            self.next_report = Some((height / interval + 1) * interval);
        }
        Ok(())
    }

    pub fn finish(&mut self) -> Result<(), Error> {
        self.state.complete = true;
        self.ctx.checkpoints.save(self.pass, &self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoints_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoints.json");
        let store = CheckpointStore::open(&path, "/data/ledger.db", 42, false).unwrap();
        let cp = PassCheckpoint {
            height: Some(20_000),
            checked: 19_999,
            invalid: 1,
            complete: false,
        };
        store.save("chain", &cp).unwrap();
        drop(store);

        let store = CheckpointStore::open(&path, "/data/ledger.db", 42, true).unwrap();
        assert_eq!(store.get("chain").unwrap(), Some(cp));
        assert_eq!(store.get("difficulty").unwrap(), None);

        // a fresh run ignores what is on disk
        let store = CheckpointStore::open(&path, "/data/ledger.db", 42, false).unwrap();
        assert_eq!(store.get("chain").unwrap(), None);
    }

    #[test]
    fn resume_checks_the_store_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoints.json");
        assert!(matches!(
            CheckpointStore::open(&path, "/data/ledger.db", 42, true),
            Err(Error::CheckpointError(_))
        ));

        let store = CheckpointStore::open(&path, "/data/ledger.db", 42, false).unwrap();
        store.save("chain", &PassCheckpoint::default()).unwrap();
        assert!(matches!(
            CheckpointStore::open(&path, "/data/ledger.db", 43, true),
            Err(Error::CheckpointError(_))
        ));
        assert!(matches!(
            CheckpointStore::open(&path, "/data/other.db", 42, true),
            Err(Error::CheckpointError(_))
        ));
    }

    #[test]
    fn progress_saves_at_interval_boundaries() {
        let ctx = StageContext {
            progress_interval: 10,
            ..StageContext::new(CancelToken::new())
        };
        let mut progress = PassProgress::start("chain", &ctx).unwrap();
        for h in 2..=15 {
            progress.done(h, 1, if h == 7 { 1 } else { 0 }).unwrap();
        }
        let saved = ctx.checkpoints.get("chain").unwrap().unwrap();
        assert_eq!(saved.height, Some(10));
        assert_eq!(saved.checked, 9);
        assert_eq!(saved.invalid, 1);
        assert!(!saved.complete);

        progress.finish().unwrap();
        let saved = ctx.checkpoints.get("chain").unwrap().unwrap();
        assert_eq!(saved.height, Some(15));
        assert!(saved.complete);
    }

    #[test]
    fn cancellation_persists_last_height() {
        let cancel = CancelToken::new();
        let ctx = StageContext::new(cancel.clone());
        let mut progress = PassProgress::start("difficulty", &ctx).unwrap();
        progress.check_cancel().unwrap();
        progress.done(5, 1, 0).unwrap();
        cancel.cancel();
        match progress.check_cancel() {
            Err(Error::Cancelled {
                stage,
                last_checkpoint,
            }) => {
                assert_eq!(stage, "difficulty");
                assert_eq!(last_checkpoint, Some(5));
            }
            other => panic!("expected cancellation, got {:?}", other),
        }
        assert_eq!(
            ctx.checkpoints.get("difficulty").unwrap().unwrap().height,
            Some(5)
        );
    }

    #[test]
    fn child_tokens_follow_parent() {
        let parent = CancelToken::new();
        let child = parent.child();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());

        let child = parent.child();
        parent.cancel();
        assert!(child.is_cancelled());
    }
}
