use serde::Serialize;

use crate::error::Result;
use crate::ingest::Supplementary;
use crate::types::{LegacySignal, RiskAssessment};

const SYSTEM_INSTRUCTION: &str = r#"# System Instruction: AERO Tactical Monitor
You are an atmospheric-environment analyst operating as a monitoring system
that protects a patient with neutrophilic asthma.
The data you receive has already been processed by a deterministic physics
and compliance engine. Treat its output (JSON) as ground truth.

## Task
1. Read `physical` (physical risk flags) and `compliance` (EU limit checks).
2. Explain, using meteorological reasoning (stagnation, wet deposition,
   secondary aerosol formation, transport aloft), why the risk is at this level.
3. Produce the report below in Markdown.

## Decision legend (Directive (EU) 2024/2881)
- 🔴 DANGER (RED): limits clearly exceeded, or dangerous meteorology (e.g. stagnation) coincides.
- 🟡 CAUTION (YELLOW): above 2030 targets, or at a level affecting vulnerable groups.
- 🟢 SAFE (GREEN): within safe range.

## Output format
Always include this table. Put your reasoning in the status column and the prose below it.

```markdown
### 🛡️ Tactical Report [ {time} ]

| Item | Value | Unit | Status |
| :--- | :--- | :--- | :--- |
| **Risk Level** | **{signal}** | - | **{main driver}** |
| PM2.5 | {pm25} | μg/m³ | Dust: {dust} |
| NO2 | {no2} | μg/m³ | NH3: {nh3} |
| SO2 | {so2} | μg/m³ | CO: {co} |
| Meteo | {temp}℃ | - | AOD: {aod} |
```

## Constraints
- No emotional reassurance. Facts and concrete countermeasures first.
- No greeting or preamble. Start with the report itself.
"#;

pub fn system_instruction() -> &'static str {
    SYSTEM_INSTRUCTION
}

#[derive(Serialize)]
struct PromptPayload<'a> {
    signal: &'a LegacySignal,
    assessment: &'a RiskAssessment,
    supplementary: &'a Supplementary,
}

/// User-side prompt: the engine output as pretty JSON plus reading hints.
pub fn build_context(
    assessment: &RiskAssessment,
    signal: &LegacySignal,
    supplementary: &Supplementary,
) -> Result<String> {
    let json = serde_json::to_string_pretty(&PromptPayload {
        signal,
        assessment,
        supplementary,
    })?;

    Ok(format!(
        "Current environmental analysis for {location} at {time}.\n\
         Write the report in the format above from this data.\n\n\
         ### Engine output (JSON)\n\
         {json}\n\n\
         ### Hints\n\
         - **physical**: every true flag is a confirmed threat derived from physics. Base your explanation on them.\n\
         - **aqi**: current EEA air quality index; `primary_pollutants` drive the overall level.\n\
         - **signal**: the quick RED/YELLOW/GREEN tier to put in the Risk Level row.\n",
        location = assessment.location,
        time = assessment.timestamp.format("%Y-%m-%d %H:%M"),
    ))
}
