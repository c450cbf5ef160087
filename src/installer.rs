//! Installer generation.
//!
//! Renders the self-contained install script that ships at the top of every
//! archive. The script runs on the target host with no reference back to the
//! build host: it creates a fresh virtualenv from the bundled bootstrapper,
//! installs the bundled wheels (and requirements, if present) without network
//! access, copies the bundled source tree in, then runs the post-install
//! fragment accumulated from the build hooks.

use std::fs;
use std::path::Path;

use crate::error::{Result, SkilletError};
use crate::template;

const INSTALLER_TEMPLATE: &str = r#"#!/bin/bash
# This script installs the bundled wheel distribution of {{name}} into
# a provided path where it will end up in a new virtualenv.

set -e

show_usage() {
  echo "Usage: ./install.sh [OPTIONS] DST"
}

show_help() {
  show_usage
cat << EOF

  Installs {{ident}} into a new virtualenv that is provided as the DST
  parameter.  The interpreter to use for this virtualenv can be
  overridden by the "-p" parameter.

Options:
  --help              display this help and exit.
  -p --python PYTHON  use an alternative Python interpreter
EOF
  exit 0
}

param_error() {
  show_usage
  echo
  echo "Error: $1"
  exit 1
}

py="{{python}}"

while [ "$#" -gt 0 ]; do
  case $1 in
    --help)         show_help ;;
    -p|--python)
      if [ "$#" -gt 1 ]; then
        py="$2"
        shift
      else
        param_error "$1 option requires an argument"
      fi
      ;;
    --python=?*)    py=${1#*=} ;;
    --)             shift; break ;;
    -?*)            param_error "no such option: $1" ;;
    *)              break
  esac
  shift
done

if [ "$1" == "" ]; then
  param_error "destination argument is required"
fi

HERE="$(cd "$(dirname "$0")"; pwd)"
DATA_DIR="$HERE/data"
SRC_DIR="$HERE/src"

command -v "$py" &> /dev/null || param_error "given python interpreter not found ($py)"

echo 'Setting up virtualenv'
"$py" "$DATA_DIR/virtualenv.py" "$1"
VIRTUAL_ENV="$(cd "$1"; pwd)"

INSTALL_ARGS=''
if [ -f "$DATA_DIR/requirements.txt" ]; then
  INSTALL_ARGS="$INSTALL_ARGS -r $DATA_DIR/requirements.txt"
fi

echo "Installing {{ident}}"
"$VIRTUAL_ENV/bin/pip" install --pre --no-index --find-links "$DATA_DIR" wheel $INSTALL_ARGS

echo "Copying {{ident}}"
cp -R "$SRC_DIR" "$VIRTUAL_ENV"

cd "$HERE"
. "$VIRTUAL_ENV/bin/activate"
{{postinstall}}

echo "Done."
"#;

/// Parameters rendered into the installer template
#[derive(Debug)]
pub struct InstallerParams<'a> {
    /// Package identity (name-version-platform)
    pub ident: &'a str,
    /// Package name
    pub name: &'a str,
    /// Basename of the interpreter chosen at build time
    pub python: &'a str,
    /// Accumulated post-install shell fragment, embedded verbatim
    pub postinstall: &'a str,
}

/// Render the installer script text
pub fn render(params: &InstallerParams) -> Result<String> {
    template::validate_field("package name", params.name)?;
    template::validate_field("package identity", params.ident)?;
    template::validate_field("python interpreter", params.python)?;

    template::render(
        INSTALLER_TEMPLATE,
        &[
            ("name", params.name),
            ("ident", params.ident),
            ("python", params.python),
            ("postinstall", params.postinstall),
        ],
    )
}

/// Write the installer to the scratchpad and mark it executable
pub fn write(path: &Path, text: &str) -> Result<()> {
    fs::write(path, text).map_err(|e| SkilletError::IoError {
        message: format!("cannot write installer {}: {}", path.display(), e),
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(|e| {
            SkilletError::IoError {
                message: format!("cannot make installer executable: {e}"),
            }
        })?;
    }

    Ok(())
}
