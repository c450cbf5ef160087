//! CLI definitions using clap derive API

use clap::builder::{Styles, styling::AnsiColor};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::archive::ArchiveFormat;

/// Skillet - self-contained Python application packaging
///
/// Builds a Python project and all of its dependencies into wheels, bundles
/// them with a virtualenv bootstrapper and an install script, and archives
/// the result for offline deployment.
#[derive(Parser, Debug)]
#[command(
    name = "skillet",
    author,
    version,
    color = clap::ColorChoice::Always,
    styles = Styles::styled()
        .header(AnsiColor::Green.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default().bold())
        .placeholder(AnsiColor::Cyan.on_default()),
    about = "Packages Python applications into self-contained installable archives",
    long_about = "Skillet packages a Python application together with a private virtualenv \
                  and all its dependency wheels into a single archive that installs on hosts \
                  without network access or a matching Python setup.",
    after_help = "\x1b[1m\x1b[32mExamples:\x1b[0m\n    \
                  skillet build\n    \
                  skillet build path/to/project --format zip\n    \
                  skillet build -p python3.12 -r requirements.txt\n    \
                  skillet cache list\n\n\
                  \x1b[1m\x1b[32mDocumentation:\x1b[0m\n    \
                  https://github.com/skillet-tools/skillet"
)]
pub struct Cli {
    /// Enable verbose output (prints the external commands being run)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a distribution archive for a Python project
    Build(BuildArgs),

    /// Inspect or clean the wheel cache
    Cache(CacheArgs),

    /// Show version information
    Version,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the build command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Build the project in the current directory:\n    skillet build\n\n\
                  Build with a specific interpreter:\n    skillet build -p python3.12\n\n\
                  Pass options through to pip:\n    skillet build --pip-option=\"--isolated\"\n\n\
                  Include extra requirements:\n    skillet build -r requirements.txt\n\n\
                  Build offline from previously cached wheels:\n    skillet build --no-download\n\n\
                  Inject build steps:\n    skillet build --prebuild-script scripts/compile-assets.sh")]
pub struct BuildArgs {
    /// Path to the project to package (defaults to the current directory)
    pub path: Option<PathBuf>,

    /// The output folder
    #[arg(long, default_value = "dist")]
    pub output: PathBuf,

    /// The python interpreter to use for building. This interpreter is both
    /// used for compiling the packages and used as the default in the
    /// generated install script
    #[arg(long, short = 'p')]
    pub python: Option<PathBuf>,

    /// The version of virtualenv to use. The default is the latest stable
    /// version from PyPI
    #[arg(long, value_name = "SPEC")]
    pub virtualenv_version: Option<String>,

    /// Adds an option to pip, passed through verbatim. To add multiple
    /// options, use this parameter multiple times
    #[arg(long = "pip-option", value_name = "OPT", allow_hyphen_values = true)]
    pub pip_option: Vec<String>,

    /// The version of the wheel package that should be used. Defaults to the
    /// latest stable version from PyPI
    #[arg(long, value_name = "SPEC")]
    pub wheel_version: Option<String>,

    /// The format of the resulting build artifact
    #[arg(long, value_enum, default_value_t = ArchiveFormat::TarGz)]
    pub format: ArchiveFormat,

    /// Path to an optional build script invoked in the build folder as the
    /// first step. This can be used to install build dependencies such as
    /// Cython
    #[arg(long, value_name = "PATH")]
    pub prebuild_script: Option<PathBuf>,

    /// Path to an optional build script invoked in the build folder as the
    /// last step. This can be used to inject additional data into the archive
    #[arg(long, value_name = "PATH")]
    pub postbuild_script: Option<PathBuf>,

    /// An optional folder where skillet should cache wheels instead of the
    /// system default
    #[arg(long, value_name = "DIR")]
    pub wheel_cache: Option<PathBuf>,

    /// Disables the wheel cache entirely
    #[arg(long)]
    pub no_wheel_cache: bool,

    /// Disables downloading of all dependencies. This only works if the
    /// dependencies have been previously cached
    #[arg(long)]
    pub no_download: bool,

    /// Path to a requirements file with additional packages to install next
    /// to the main one. Useful for pulling in optional dependencies
    #[arg(long, short = 'r', value_name = "PATH")]
    pub requirements: Option<PathBuf>,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Show cache statistics:\n    skillet cache\n\n\
                  List cached wheel sets:\n    skillet cache list\n\n\
                  Remove everything:\n    skillet cache clear\n\n\
                  Remove one entry:\n    skillet cache clear --only webapp-1.0-linux-x86_64-abcd1234")]
pub struct CacheArgs {
    /// Cache directory to operate on instead of the system default
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<CacheSubcommand>,
}

#[derive(Subcommand, Debug)]
pub enum CacheSubcommand {
    /// List cached wheel-set entries
    List,

    /// Remove cached entries
    Clear(ClearArgs),
}

/// Arguments for cache clear
#[derive(Parser, Debug)]
pub struct ClearArgs {
    /// Remove only the entry with this key
    #[arg(long, value_name = "KEY")]
    pub only: Option<String>,
}

/// Arguments for completions command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Generate bash completions:\n    skillet completions --shell bash > ~/.bash_completion.d/skillet\n\n\
                  Generate zsh completions:\n    skillet completions --shell zsh > ~/.zfunc/_skillet\n\n\
                  Generate fish completions:\n    skillet completions --shell fish > ~/.config/fish/completions/skillet.fish")]
pub struct CompletionsArgs {
    /// Shell type (bash, elvish, fish, powershell, zsh)
    #[arg(long)]
    pub shell: String,
}
