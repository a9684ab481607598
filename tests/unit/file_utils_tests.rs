/*!
 * Tests for source file intake
 */

use anyhow::Result;
use tomeport::file_utils::{FileManager, source_hash};

use crate::common;

/// Test that file_exists returns true for existing files only
#[test]
fn test_fileExists_withExistingFile_shouldReturnTrue() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let test_file = common::create_test_file(temp_dir.path(), "novel.txt", "第1章 开端")?;

    assert!(FileManager::file_exists(&test_file));
    assert!(!FileManager::file_exists(temp_dir.path()));
    assert!(!FileManager::file_exists(temp_dir.path().join("missing.txt")));
    Ok(())
}

/// Test that a Windows-edited source reads back as plain LF text
#[test]
fn test_readSourceText_withBomAndCrlf_shouldNormalize() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(temp_dir.path(), "novel.txt", "\u{feff}第1章 开端\r\n他来了。\r\n")?;

    let text = FileManager::read_source_text(&path)?;

    assert_eq!(text, "第1章 开端\n他来了。\n");
    Ok(())
}

/// Test that non UTF-8 bytes are rejected rather than mangled
#[test]
fn test_readSourceText_withInvalidUtf8_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("gbk.txt");
    std::fs::write(&path, [0xb5u8, 0xda, 0x31, 0xd5, 0xc2])?;

    let err = FileManager::read_source_text(&path).unwrap_err();

    assert!(format!("{:#}", err).contains("UTF-8"));
    Ok(())
}

/// Test that write_to_file creates missing parent directories
#[test]
fn test_writeToFile_withNestedPath_shouldCreateParents() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("exports").join("42").join("chapter.txt");

    FileManager::write_to_file(&path, "content")?;

    assert_eq!(std::fs::read_to_string(&path)?, "content");
    Ok(())
}

/// Test that the same text always hashes the same way
#[test]
fn test_sourceHash_shouldDependOnContentOnly() {
    assert_eq!(source_hash("第1章"), source_hash("第1章"));
    assert_ne!(source_hash("第1章"), source_hash("第2章"));
    assert_eq!(source_hash("").len(), 64);
}
