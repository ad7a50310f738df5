use anyhow::Result;
use ruinsim::config::SimConfig;
use ruinsim::logging::{log, obj, v_str, Domain, Level};
use ruinsim::sim::Simulation;

fn main() -> Result<()> {
    let cfg = SimConfig::from_env();
    let mut sim = match Simulation::new(cfg) {
        Ok(sim) => sim,
        Err(err) => {
            log(
                Level::Fatal,
                Domain::System,
                "setup_failed",
                obj(&[("msg", v_str(&err.to_string()))]),
            );
            return Err(err);
        }
    };
    let report = sim.run()?;
    println!("{}", report.to_json()?);
    Ok(())
}
