#![allow(dead_code)]

use std::cell::RefCell;

use rustfft_gpu::{Backend, CompilationUnit, DeviceInfo, Dialect, KernelArg, LaunchGeometry, Stage};

#[derive(Debug)]
pub struct RecordingError(pub String);
impl std::fmt::Display for RecordingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
impl std::error::Error for RecordingError {}

#[derive(Debug, Clone)]
pub struct Launch {
    pub stage: Stage,
    pub args: Vec<KernelArg<u32>>,
    pub geometry: LaunchGeometry,
}

/// Records every compilation unit and launch without running anything
pub struct RecordingBackend {
    pub dialect: Dialect,
    pub info: DeviceInfo,
    pub work_group_multiple: usize,
    pub reject_source: Option<&'static str>,
    pub units: RefCell<Vec<CompilationUnit>>,
    pub launches: RefCell<Vec<Launch>>,
}

impl RecordingBackend {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            info: DeviceInfo {
                local_mem_size: 48 * 1024,
                max_work_group_size: 1024,
            },
            work_group_multiple: 32,
            reject_source: None,
            units: RefCell::new(Vec::new()),
            launches: RefCell::new(Vec::new()),
        }
    }

    pub fn unit(&self, entry_point: &str) -> CompilationUnit {
        self.units
            .borrow()
            .iter()
            .find(|unit| unit.entry_point == entry_point)
            .cloned()
            .unwrap_or_else(|| panic!("no unit for {}", entry_point))
    }
}

impl Backend for RecordingBackend {
    type Program = Stage;
    type Kernel = Stage;
    type Buffer = u32;
    type Error = RecordingError;

    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn device_info(&self) -> DeviceInfo {
        self.info
    }

    fn build(&self, unit: &CompilationUnit) -> Result<Stage, RecordingError> {
        if let Some(needle) = self.reject_source {
            if unit.source.contains(needle) {
                return Err(RecordingError(format!("error: rejected '{}'", needle)));
            }
        }
        self.units.borrow_mut().push(unit.clone());
        Ok(unit.stage)
    }

    fn kernel(&self, program: &Stage, name: &str) -> Result<Stage, RecordingError> {
        assert_eq!(program.entry_point(), name);
        Ok(*program)
    }

    fn preferred_work_group_multiple(&self, _kernel: &Stage) -> Result<usize, RecordingError> {
        Ok(self.work_group_multiple)
    }

    fn enqueue(&self, kernel: &Stage, args: &[KernelArg<u32>], geometry: &LaunchGeometry) -> Result<(), RecordingError> {
        self.launches.borrow_mut().push(Launch {
            stage: *kernel,
            args: args.to_vec(),
            geometry: *geometry,
        });
        Ok(())
    }
}
