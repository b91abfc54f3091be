#![allow(dead_code)]

use slide_scan::{
    config::{Config, Timings},
    convert::Converter,
    engine::{DocumentHandle, EngineProcessManager, EngineSession, ProcessTable, RenderEngine},
    error::EngineError,
    ocr::{OcrEngine, TextLine},
};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What the fake engine should do.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub pages: u32,
    /// Number of initial launches that fail.
    pub fail_launches: u32,
    /// Number of initial opens that fail; `u32::MAX` fails every open.
    pub fail_opens: u32,
    pub failing_pages: Vec<u32>,
    /// Page whose export hangs until the per-op timeout.
    pub hanging_page: Option<u32>,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub launches: u32,
    pub live: u32,
    pub kills: u32,
    pub opens: u32,
    pub opened: Vec<PathBuf>,
    pub staged_existed_at_open: Vec<bool>,
    pub exports: Vec<u32>,
    pub closes: u32,
    pub quits: u32,
}

#[derive(Clone)]
pub struct FakeEngine {
    pub plan: Plan,
    pub state: Arc<Mutex<FakeState>>,
}

impl FakeEngine {
    pub fn new(plan: Plan) -> Self {
        Self {
            plan,
            state: Arc::new(Mutex::new(FakeState::default())),
        }
    }
}

impl RenderEngine for FakeEngine {
    fn launch(&self) -> Result<Box<dyn EngineSession>, EngineError> {
        let mut st = self.state.lock().unwrap();
        st.launches += 1;
        if st.launches <= self.plan.fail_launches {
            return Err(EngineError::Launch("automation server unavailable".into()));
        }
        st.live += 1;
        Ok(Box::new(FakeSession {
            plan: self.plan.clone(),
            state: self.state.clone(),
        }))
    }
}

struct FakeSession {
    plan: Plan,
    state: Arc<Mutex<FakeState>>,
}

impl EngineSession for FakeSession {
    fn open(&mut self, path: &Path) -> Result<DocumentHandle, EngineError> {
        let mut st = self.state.lock().unwrap();
        st.opens += 1;
        st.opened.push(path.to_path_buf());
        st.staged_existed_at_open.push(path.exists());
        if st.opens <= self.plan.fail_opens {
            return Err(EngineError::Operation {
                op: "open",
                message: "presentation could not be opened".into(),
            });
        }
        Ok(DocumentHandle(1))
    }

    fn page_count(&mut self, _doc: &DocumentHandle) -> Result<u32, EngineError> {
        Ok(self.plan.pages)
    }

    fn export_page(
        &mut self,
        _doc: &DocumentHandle,
        index: u32,
        dest: &Path,
    ) -> Result<(), EngineError> {
        self.state.lock().unwrap().exports.push(index);
        if self.plan.hanging_page == Some(index) {
            return Err(EngineError::Timeout {
                op: "export",
                after: Duration::from_secs(60),
            });
        }
        if self.plan.failing_pages.contains(&index) {
            return Err(EngineError::Operation {
                op: "export",
                message: format!("slide {index} could not be rendered"),
            });
        }
        std::fs::write(dest, format!("png page {index}")).map_err(|e| EngineError::Operation {
            op: "export",
            message: e.to_string(),
        })
    }

    fn close(&mut self, _doc: DocumentHandle) -> Result<(), EngineError> {
        self.state.lock().unwrap().closes += 1;
        Ok(())
    }

    fn quit(&mut self) -> Result<(), EngineError> {
        let mut st = self.state.lock().unwrap();
        st.quits += 1;
        st.live = st.live.saturating_sub(1);
        Ok(())
    }
}

pub struct FakeProcessTable {
    pub state: Arc<Mutex<FakeState>>,
}

impl ProcessTable for FakeProcessTable {
    fn kill_by_name(&self, _names: &[String]) -> anyhow::Result<usize> {
        let mut st = self.state.lock().unwrap();
        st.kills += 1;
        let matched = usize::from(st.live > 0);
        st.live = 0;
        Ok(matched)
    }
}

pub fn test_config(root: &Path) -> Config {
    let mut cfg = Config::default();
    cfg.paths.root = root.display().to_string();
    cfg.paths.work_dir = root.join("work").display().to_string();
    cfg.timings = Timings::zero();
    cfg.logging.write_to_file = false;
    cfg
}

pub fn converter(cfg: &Config, engine: &FakeEngine) -> Converter {
    let manager = EngineProcessManager::new(
        Box::new(engine.clone()),
        Box::new(FakeProcessTable {
            state: engine.state.clone(),
        }),
        cfg.engine.process_names.clone(),
        cfg.timings.clone(),
    );
    Converter::new(cfg, manager)
}

pub fn write_pptx(path: &Path) {
    let mut bytes = b"PK\x03\x04".to_vec();
    bytes.resize(512, 0);
    write_bytes(path, &bytes);
}

pub fn write_ppt(path: &Path) {
    let mut bytes = vec![0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
    bytes.resize(512, 0);
    write_bytes(path, &bytes);
}

pub fn write_bytes(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, bytes).unwrap();
}

/// Entries left under the staging work root.
pub fn leftovers(work: &Path) -> usize {
    match std::fs::read_dir(work) {
        Ok(rd) => rd.count(),
        Err(_) => 0,
    }
}

/// OCR fake keyed by image file name.
#[derive(Default)]
pub struct FakeOcr {
    pub lines: HashMap<String, Vec<TextLine>>,
    pub failing: HashSet<String>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeOcr {
    pub fn with(mut self, file: &str, texts: &[(&str, f64)]) -> Self {
        self.lines.insert(
            file.to_string(),
            texts
                .iter()
                .map(|(t, c)| TextLine {
                    text: t.to_string(),
                    confidence: *c,
                })
                .collect(),
        );
        self
    }
}

impl OcrEngine for FakeOcr {
    fn recognize(&self, image: &Path) -> anyhow::Result<Vec<TextLine>> {
        let name = image.file_name().unwrap().to_string_lossy().into_owned();
        self.calls.lock().unwrap().push(name.clone());
        if self.failing.contains(&name) {
            anyhow::bail!("recognizer crashed on {name}");
        }
        Ok(self.lines.get(&name).cloned().unwrap_or_default())
    }
}
