use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System, get_current_pid};

// Resident memory of this process, one System kept between samples
pub struct ProcessMemory {
    system: System,
    pid: Pid,
}

impl ProcessMemory {
    pub fn new() -> Option<Self> {
        let pid = get_current_pid().ok()?;
        let mut memory = Self {
            system: System::new(),
            pid,
        };
        memory.refresh();
        Some(memory)
    }

    fn refresh(&mut self) {
        let targets = [self.pid];
        if self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&targets),
            false,
            ProcessRefreshKind::nothing().with_memory(),
        ) == 0
        {
            self.system.refresh_processes(ProcessesToUpdate::All, false);
        }
    }

    pub fn resident_bytes(&mut self) -> Option<u64> {
        self.refresh();
        self.system.process(self.pid).map(|process| process.memory())
    }
}

pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}
