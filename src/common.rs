use std::fs::File;
use std::io::Write;
use std::path::Path;

pub fn write_string_to_file(filename: &str, content: &str) -> std::io::Result<()> {
    let path = Path::new(filename);
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_string_to_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.yaml");
        let path_str = path.to_str().expect("utf-8 path");
        write_string_to_file(path_str, "data_files: {}\n").expect("write");
        assert_eq!(
            std::fs::read_to_string(&path).expect("read"),
            "data_files: {}\n"
        );
    }
}
