use clap::Subcommand;
use projgen_core::config::Config;
use projgen_core::project::{self, ProjectInfo};
use std::path::Path;

use crate::output::{print_json, print_table};

#[derive(Subcommand)]
pub enum ProjectsSubcommand {
    /// List an owner's projects
    List { owner: String },

    /// Show a project's metadata and files
    Show { owner: String, project: String },

    /// Print one generated file
    Cat {
        owner: String,
        project: String,
        path: String,
    },
}

pub fn run(root: &Path, subcmd: ProjectsSubcommand, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root)?;
    let projects_dir = config.projects_path(root);

    match subcmd {
        ProjectsSubcommand::List { owner } => {
            let projects = project::list_projects(&projects_dir, &owner)?;
            if json {
                return print_json(&projects);
            }
            if projects.is_empty() {
                println!("No projects for owner '{owner}'.");
                return Ok(());
            }
            let rows = projects
                .iter()
                .map(|(name, files)| vec![name.clone(), files.len().to_string()])
                .collect();
            print_table(&["PROJECT", "FILES"], rows);
        }
        ProjectsSubcommand::Show { owner, project } => {
            let dir = project::resolve_project_dir(&projects_dir, &owner, &project)?;
            let info = ProjectInfo::load(&dir)?;
            let files = projgen_core::io::relative_files(&dir)?;
            if json {
                return print_json(&serde_json::json!({
                    "path": dir,
                    "info": info,
                    "files": files,
                }));
            }
            println!("Path:        {}", dir.display());
            if let Some(info) = info {
                println!("Description: {}", info.original_description);
                println!("Tech stack:  {}", info.tech_stack);
                println!("Difficulty:  {}", info.difficulty);
            }
            println!("Files:");
            for file in files {
                println!("  {file}");
            }
        }
        ProjectsSubcommand::Cat {
            owner,
            project,
            path,
        } => {
            let content = project::read_project_file(&projects_dir, &owner, &project, &path)?;
            if json {
                return print_json(&serde_json::json!({ "path": path, "content": content }));
            }
            print!("{content}");
        }
    }
    Ok(())
}
