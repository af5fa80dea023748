use spyglass::Interpreter;
use std::path::Path;
use std::process::ExitCode;

fn main() -> ExitCode {
    let scripts: Vec<String> = std::env::args().skip(1).collect();
    if scripts.is_empty() {
        eprintln!("usage: spyglass <script>...");
        return ExitCode::from(2);
    }

    let mut interp = Interpreter::new();
    let mut last = spyglass::Value::Nil;
    for script in &scripts {
        match interp.eval_script(Path::new(script)) {
            Ok(value) => last = value,
            Err(err) => {
                eprintln!("{}", interp.render_error(&err));
                return ExitCode::FAILURE;
            }
        }
    }
    println!("{}", last);
    ExitCode::SUCCESS
}
