// Copyright (C) 2025 The forgehost developers
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Renders a bootstrap script into the user-data document handed to the instance.

use minijinja::{AutoEscape, Environment, context};

use super::{BootstrapScript, ComposeError};

const USER_DATA_TEMPLATE: &str =
    "#!/bin/bash\n{% for command in commands %}{{ command }}\n{% endfor %}";

/// `#!/bin/bash` followed by one command per line.
pub fn render_user_data(script: &BootstrapScript) -> Result<String, ComposeError> {
    let mut env = Environment::new();
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.add_template("user-data.sh", USER_DATA_TEMPLATE)?;

    let template = env.get_template("user-data.sh")?;
    let rendered = template.render(context! { commands => script.commands() })?;
    Ok(rendered)
}
