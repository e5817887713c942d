use crate::domain::model::{BuildInfo, BuildPlan, DebianArchitecture};
use crate::project::Project;

pub fn has_declared_architectures(project: &Project) -> bool {
    project.platforms.is_some() || project.architectures.is_some()
}

/// Resolve the project's `(build-on, build-for)` pairs.
pub fn get_build_plan(project: &Project) -> BuildPlan {
    build_plan_for_host(project, DebianArchitecture::from_host())
}

pub fn build_plan_for_host(project: &Project, host: DebianArchitecture) -> BuildPlan {
    if let Some(platforms) = &project.platforms {
        return platforms
            .iter()
            .flat_map(|platform| {
                platform
                    .build_on
                    .iter()
                    .map(move |on| BuildInfo::new(&platform.name, on, &platform.build_for))
            })
            .collect();
    }

    if let Some(architectures) = &project.architectures {
        let mut plan = Vec::new();
        for entry in architectures {
            for on in &entry.build_on {
                // 沒有 build-for 時，build-on 即為 build-for
                let build_for = entry.build_for.as_deref().unwrap_or(on);
                plan.push(BuildInfo::new(build_for, on, build_for));
            }
        }
        return plan;
    }

    let host = host.as_str();
    vec![BuildInfo::new(host, host, host)]
}

pub fn filter_plan(plan: &[BuildInfo], build_for: &str) -> BuildPlan {
    plan.iter()
        .filter(|info| info.build_for == build_for)
        .cloned()
        .collect()
}
