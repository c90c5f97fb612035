use std::io::Read;

use ptx_difftest::driver::command::DriverRequest;
use ptx_difftest::driver::EmulatorDriver;
use ptx_difftest::kernels::bitwise::ShiftPolicy;
use ptx_difftest::registry::Registry;

pub fn run(shift_policy: ShiftPolicy) -> Result<(), Box<dyn std::error::Error>> {
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;
    let request: DriverRequest = serde_json::from_str(&input)?;
    let emulator = EmulatorDriver::new(Registry::builtin(shift_policy));
    let response = emulator.serve(&request);
    println!("{}", serde_json::to_string(&response)?);
    Ok(())
}
