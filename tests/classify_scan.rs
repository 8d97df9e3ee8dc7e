mod common;

use common::touch;
use mineru_batch::{
    classify::{FileKind, InputFile, scan_dir},
    config::Config,
};
use std::path::Path;

#[test]
fn extension_table() {
    assert_eq!(FileKind::from_extension("pdf"), Some(FileKind::Pdf));
    for ext in ["doc", "docx", "ppt", "pptx", "xls", "xlsx"] {
        assert_eq!(FileKind::from_extension(ext), Some(FileKind::Office));
    }
    for ext in ["jpg", "jpeg", "png", "bmp", "tiff", "gif"] {
        assert_eq!(FileKind::from_extension(ext), Some(FileKind::Image));
    }
    for ext in ["txt", "md", "tif", "webp", ""] {
        assert_eq!(FileKind::from_extension(ext), None);
    }
}

#[test]
fn input_file_naming() {
    let f = InputFile::from_path(Path::new("/in/Quarterly Report.v2.PDF")).expect("recognized");
    assert_eq!(f.kind, FileKind::Pdf);
    assert_eq!(f.extension, "pdf");
    assert_eq!(f.base_name, "Quarterly Report.v2");
    assert_eq!(f.file_name, "Quarterly Report.v2.PDF");
    assert_eq!(
        f.out_dir(Path::new("/out")),
        Path::new("/out/Quarterly Report.v2")
    );

    assert!(InputFile::from_path(Path::new("/in/.pdf")).is_none());
    assert!(InputFile::from_path(Path::new("/in/notes")).is_none());
}

#[test]
fn scan_counts_recognized_and_ignored() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["a.pdf", "b.PDF", "c.docx", "d.pptx", "e.png", "f.JPEG"] {
        touch(dir.path(), name);
    }
    for name in ["readme.txt", "data.csv", "noext"] {
        touch(dir.path(), name);
    }
    std::fs::create_dir(dir.path().join("nested.pdf")).unwrap();

    let scan = scan_dir(&Config::default(), dir.path()).unwrap();
    assert_eq!(scan.pdf.len(), 2);
    assert_eq!(scan.office.len(), 2);
    assert_eq!(scan.image.len(), 2);
    assert_eq!(scan.total(), 6);
    assert_eq!(scan.ignored, 3);
}

#[test]
fn ordered_groups_pdf_then_office_then_image() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["z.png", "y.xlsx", "x.pdf", "w.gif", "v.doc", "u.pdf"] {
        touch(dir.path(), name);
    }
    let scan = scan_dir(&Config::default(), dir.path()).unwrap();
    let kinds: Vec<FileKind> = scan.ordered().map(|f| f.kind).collect();
    assert_eq!(
        kinds,
        vec![
            FileKind::Pdf,
            FileKind::Pdf,
            FileKind::Office,
            FileKind::Office,
            FileKind::Image,
            FileKind::Image,
        ]
    );
}

#[test]
fn disabled_kinds_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["a.pdf", "b.docx", "c.png"] {
        touch(dir.path(), name);
    }
    let mut cfg = Config::default();
    cfg.scan.enabled_kinds = vec!["PDF".into()];

    let scan = scan_dir(&cfg, dir.path()).unwrap();
    assert_eq!(scan.total(), 1);
    assert_eq!(scan.pdf[0].file_name, "a.pdf");
    assert_eq!(scan.ignored, 2);
}
