use std::any::Any;
use std::io::{self, Write};
use std::panic;
use std::process::ExitCode;

use cmdtree::completion::protocol::{CompletionEnv, write_candidates};
use cmdtree::config::Settings;
use cmdtree::error::EXIT_FAILURE;
use cmdtree::{logging, surface};

fn install_broken_pipe_handler() {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let payload = info.payload();
        let is_broken = <dyn Any>::downcast_ref::<&str>(payload)
            .is_some_and(|s| s.contains("Broken pipe"))
            || <dyn Any>::downcast_ref::<String>(payload)
                .is_some_and(|s| s.contains("Broken pipe"));

        if is_broken {
            std::process::exit(0);
        }

        default_hook(info);
    }));
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn main() -> ExitCode {
    install_broken_pipe_handler();

    let settings = Settings::from_env();
    logging::init(&settings.log_filter);

    let ctx = match surface::context(settings) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("ERROR: ({}) {e}", surface::PROGRAM);
            return exit_code(EXIT_FAILURE);
        }
    };

    if let Some(env) = CompletionEnv::from_env() {
        let completion = ctx.complete(env.before_cursor());
        let mut stdout = io::stdout().lock();
        let _ = write_candidates(&mut stdout, &completion.candidates, &env.ifs);
        let _ = stdout.flush();
        let _ = io::stderr().write_all(&completion.stderr);
        return exit_code(completion.exit_code);
    }

    let argv: Vec<String> = std::env::args().skip(1).collect();
    if argv.first().map(String::as_str) == Some("--version") {
        println!("{} {}", surface::PROGRAM, surface::VERSION);
        return ExitCode::SUCCESS;
    }

    let invocation = ctx.invoke(&argv);
    let _ = io::stdout().write_all(&invocation.stdout);
    let _ = io::stderr().write_all(&invocation.stderr);
    exit_code(invocation.exit_code)
}
