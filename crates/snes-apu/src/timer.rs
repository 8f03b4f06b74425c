use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timer {
    resolution: u32,
    is_running: bool,
    ticks: u32,
    // Target value written via $FA-$FC. Note: value 0 means 256 steps.
    target: u8,
    stage2: u8,
    counter: u8,
}

impl Timer {
    /// `resolution` is the number of APU cycles per stage-1 step (128 for
    /// timers 0/1, 16 for timer 2).
    pub fn new(resolution: u32) -> Timer {
        Timer {
            resolution,
            is_running: false,
            ticks: 0,
            target: 0,
            stage2: 0,
            counter: 0,
        }
    }

    pub fn reset(&mut self) {
        self.is_running = false;
        self.ticks = 0;
        self.target = 0;
        self.stage2 = 0;
        self.counter = 0;
    }

    pub fn tick(&mut self, num_cycles: u32) {
        if !self.is_running {
            return;
        }
        self.ticks += num_cycles;
        while self.ticks >= self.resolution {
            self.ticks -= self.resolution;

            // Post-increment compare; a target of 0 matches on wrap after 256 steps.
            self.stage2 = self.stage2.wrapping_add(1);
            if self.stage2 == self.target {
                self.stage2 = 0;
                self.counter = (self.counter + 1) & 0x0F;
            }
        }
    }

    pub fn set_running(&mut self, value: bool) {
        // Only a stopped -> running transition clears the stages.
        if value && !self.is_running {
            self.ticks = 0;
            self.stage2 = 0;
            self.counter = 0;
        }
        self.is_running = value;
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn set_target(&mut self, value: u8) {
        self.target = value;
    }

    /// Reads the 4-bit output counter, which clears it.
    pub fn read_counter(&mut self) -> u8 {
        let ret = self.counter;
        self.counter = 0;
        ret
    }
}
