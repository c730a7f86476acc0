//! Captured Python failure output used across tests.

pub const SYNTAX_INVALID: &str = r#"  File "/tmp/raie-3kq1.py", line 4
    print("total" total)
          ^^^^^^^^^^^^^
SyntaxError: invalid syntax. Perhaps you forgot a comma?
"#;

pub const SYNTAX_EOF: &str = r#"  File "/tmp/raie-8xw2.py", line 12

    ^
SyntaxError: unexpected EOF while parsing
"#;

pub const MODULE_NOT_FOUND: &str = r#"Traceback (most recent call last):
  File "/tmp/raie-f0a9.py", line 1, in <module>
    import numpy as np
ModuleNotFoundError: No module named 'numpy'
"#;

pub const NAME_ERROR: &str = r#"Traceback (most recent call last):
  File "/tmp/raie-c71d.py", line 7, in <module>
    print(resutl)
          ^^^^^^
NameError: name 'resutl' is not defined
"#;

pub const TYPE_ERROR_ARGS: &str = r#"Traceback (most recent call last):
  File "/tmp/raie-1b2c.py", line 9, in <module>
    add(1, 2, 3)
TypeError: add() takes 2 positional arguments but 3 were given
"#;
